//! Advisor prompt template and assembly.
//!
//! The template is a fixed instruction block with two substitution points:
//! `{context}` (the retrieved records, rendered in retrieval order) and
//! `{question}` (the raw query). The assembler never truncates; input
//! limits are the generation backend's concern.

use crate::models::Document;

/// Instruction template sent to the chat model on every request.
pub const ADVISOR_TEMPLATE: &str = r#"**Your role:** You are a personal course and career advisor helping computer science students find the classes and career-building opportunities that best fit their preferences, academic goals, and schedule.

**User persona:** You are talking to a computer science major looking for advice on which courses to take next semester to meet degree requirements, build practical skills, and explore related opportunities such as internships or fellowships.

**Task:** Identify and recommend the top 3 courses that best match the student's query, along with any relevant internship, fellowship, or career-building opportunities.

**Process:**
1. Interpret the query carefully and identify the student's priorities: career aspirations or academic goals, preferred teaching style, logistical constraints such as class times or prerequisites, and interest in extracurricular opportunities.
2. Work only from the reference records provided in the context below.
3. Produce a concise response listing the top 3 courses, each with its name, a short summary, and why it matches the query, followed by up to 2-3 relevant internship, fellowship, or professional opportunities with brief descriptions and how to pursue them.

**Additional guidance:**
- Give clear, actionable recommendations that help the student make informed decisions.
- If the query is ambiguous or incomplete, ask clarifying questions before recommending.
- If the student asks for general advice, balance academic and career considerations.
- If the student raises personal challenges, respond with empathy and practical suggestions.
- If the student shows interest in a specific topic, point out further resources or opportunities in that area.
- Never mention system information or the AI framework behind this assistance.

You are required to answer the question based only on the following context and the guidelines above:

**Context:** {context}

**Question:** {question}
"#;

/// Render retrieved documents into the context block.
///
/// One numbered block per document, body first, attributes appended as a
/// compact JSON object. Zero documents render as an empty string; the
/// template still produces a well-formed prompt around it.
pub fn render_context(docs: &[Document]) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| {
            let attrs = serde_json::to_string(&doc.attributes).unwrap_or_else(|_| "{}".to_string());
            format!("[{}] {}\nattributes: {}", i + 1, doc.body, attrs)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the template's two slots.
pub fn assemble(docs: &[Document], question: &str) -> String {
    let context = render_context(docs);
    ADVISOR_TEMPLATE
        .replacen("{context}", &context, 1)
        .replacen("{question}", question, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttrValue, Attributes, Document};

    fn doc(body: &str) -> Document {
        let mut attributes = Attributes::new();
        attributes.insert(
            "Course Name".to_string(),
            AttrValue::Scalar("CS101".to_string()),
        );
        Document {
            id: Some("CS101".to_string()),
            body: body.to_string(),
            attributes,
        }
    }

    #[test]
    fn test_context_contains_record_text() {
        let prompt = assemble(&[doc("Course Name: CS101\nDescription: Intro")], "what now?");
        assert!(prompt.contains("Course Name: CS101\nDescription: Intro"));
        assert!(prompt.contains("what now?"));
    }

    #[test]
    fn test_empty_context_still_well_formed() {
        let prompt = assemble(&[], "anything good in the evenings?");
        assert!(prompt.contains("**Context:**"));
        assert!(prompt.contains("**Question:** anything good in the evenings?"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn test_retrieval_order_preserved() {
        let prompt = assemble(&[doc("first record"), doc("second record")], "q");
        let first = prompt.find("first record").unwrap();
        let second = prompt.find("second record").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_attributes_rendered() {
        let prompt = assemble(&[doc("Course Name: CS101")], "q");
        assert!(prompt.contains("attributes:"));
        assert!(prompt.contains("CS101"));
    }
}
