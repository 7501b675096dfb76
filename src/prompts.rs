//! Prompts for schema-constrained review extraction.
//!
//! Callers normally supply their own review template (one per review
//! round or checklist); [`DEFAULT_REVIEW_PROMPT`] is used only when
//! [`crate::config::ReviewConfig::prompt_template`] is `None`.

/// Header placed between the review template and the document text.
pub const CONTENT_SECTION_HEADER: &str = "# PDF Content (Markdown format):";

/// Default review instructions.
pub const DEFAULT_REVIEW_PROMPT: &str = r#"You are a meticulous design reviewer. The documents below are a requirements
specification and one or more versions of the design that must satisfy it.
Each document is introduced by a banner that names it and, where known, says
whether it is the previous or the current version of the design.

For EVERY requirement item in the specification, produce one row:

1. requirement_no       — the identifier exactly as written (e.g. REQ-001)
2. requirement_content  — the requirement text (persona: instruction)
3. evaluation           — 〇 if fully met, △ if partially met, × if not met
4. compliance_location  — where in the current design the item is (or should be) addressed
5. compliance_reason    — why you judged it compliant or non-compliant
6. correction_plan      — a concrete correction, including a golden case where useful
7. response_status      — whether the previous version's findings were addressed
8. response_method      — how they were addressed, or why not

Rules:
- Keep rows in the order the requirements appear in the specification.
- Do NOT omit, merge or summarise rows. Continue to the very last item.
- Use an empty string for a field that genuinely does not apply.
- Answer in the language of the documents."#;

/// Compose the single request payload: template, section header, then
/// the concatenated document text.
pub fn compose_request(template: &str, document_text: &str) -> String {
    format!("{template}\n\n{CONTENT_SECTION_HEADER}\n\n{document_text}\n")
}

/// System instruction for chat providers that cannot enforce a response
/// schema natively. The schema is embedded verbatim.
pub fn json_only_instruction(schema: &serde_json::Value) -> String {
    let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "Respond with a single JSON object and nothing else. \
Do NOT wrap it in ```json fences and do NOT add commentary.\n\
The object must match this schema exactly (all row fields are required strings):\n\n{pretty}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_orders_template_header_text() {
        let req = compose_request("TEMPLATE", "DOCS");
        let t = req.find("TEMPLATE").unwrap();
        let h = req.find(CONTENT_SECTION_HEADER).unwrap();
        let d = req.find("DOCS").unwrap();
        assert!(t < h && h < d);
    }

    #[test]
    fn json_instruction_embeds_schema() {
        let schema = crate::schema::review_table_schema();
        let s = json_only_instruction(&schema);
        assert!(s.contains("requirement_no"));
        assert!(s.contains("response_method"));
    }
}
