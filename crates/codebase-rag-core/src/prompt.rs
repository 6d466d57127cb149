//! Augmented prompt construction.

use crate::models::QueryHit;

pub const DEFAULT_PROJECT_NAME: &str = "codebase";

/// Builds the generation prompt: the literal query, then each hit's file
/// path and text in the order given, then the instruction suffix.
///
/// The `Relevant Project Context:` section is omitted when `context` is
/// empty.
pub fn build_prompt(query: &str, context: &[QueryHit], project_name: &str) -> String {
    let mut prompt = format!("User Query: {}\n\n", query);

    if !context.is_empty() {
        prompt.push_str("Relevant Project Context:\n");
        for hit in context {
            prompt.push_str(&format!(
                "--- File: {} ---\n{}\n---\n\n",
                hit.metadata.file_path, hit.text
            ));
        }
    }

    prompt.push_str(&format!(
        "Based on the provided context from the {} project and your general knowledge, \
         please respond to the user query. Be specific and reference the code/files when relevant.\n",
        project_name
    ));
    prompt
}
