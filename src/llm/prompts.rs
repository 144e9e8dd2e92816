//! Personas and prompt templates.
//!
//! The corpus and the question set are in Brazilian Portuguese, so are the
//! texts sent to the models.

use crate::index::SearchHit;

/// Collection of personas and prompt templates.
pub struct Prompts;

impl Prompts {
    /// System persona for retrieval-grounded variants.
    pub fn rag_persona() -> &'static str {
        "Você é um assistente acadêmico especializado em redes sem fio. Suas respostas devem ser em \
português do Brasil e baseadas estritamente nos documentos fornecidos, com análise crítica e \
redação original. Responda com foco em Wi-Fi 7 (IEEE 802.11be), explicando os conceitos de \
maneira clara, objetiva e tecnicamente precisa, sem recorrer a conhecimento externo. Utilize \
apenas as informações presentes nos documentos, mantendo o rigor técnico, evitando jargões \
excessivos e garantindo que a resposta seja interpretável por profissionais da área técnica ou \
estudantes avançados."
    }

    /// System persona for control variants (general knowledge, no documents).
    pub fn control_persona() -> &'static str {
        "Você é um assistente técnico especializado em redes sem fio, com foco em Wi-Fi 7 \
(IEEE 802.11be). Responda sempre em português do Brasil de forma clara, objetiva e acessível, \
utilizando termos corretos, mas explicando conceitos de maneira simples. Evite jargões \
excessivos. Seja direto, didático e preciso, como se estivesse explicando para um profissional \
da área técnica que deseja respostas rápidas, porém compreensíveis por qualquer pessoa com \
conhecimento básico em tecnologia. Responda com conhecimento geral (não use documentos \
específicos)."
    }

    /// Prompt grounding a question on retrieved excerpts.
    pub fn rag_answer() -> &'static str {
        r#"Com base nestes trechos:
{context}
Responda à pergunta abaixo com suas próprias palavras.
Pergunta: {question}"#
    }

    /// One retrieved excerpt inside the context block.
    pub fn context_entry() -> &'static str {
        r#"Fonte: {source} (Página {page})
Conteúdo: {text}
------"#
    }
}

/// Render the context block: one entry per hit, separated by a blank line.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            Prompts::context_entry()
                .replace("{source}", &hit.chunk.source)
                .replace("{page}", &crate::document::page_label(hit.chunk.page))
                .replace("{text}", &hit.chunk.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the RAG prompt for `question` over `hits`.
pub fn build_rag_prompt(question: &str, hits: &[SearchHit]) -> String {
    // {context} precedes {question} in the template, so filling the question
    // first keeps placeholder-like text in either value literal.
    Prompts::rag_answer()
        .replacen("{question}", question, 1)
        .replacen("{context}", &build_context(hits), 1)
}
