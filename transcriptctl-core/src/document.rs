//! Markdown rendering of a captured transcript.
//!
//! The document has four parts: a header, the conversation flow (which
//! only references attachments and artifacts), a context appendix holding
//! their full content under `att-N` / `art-N` anchors, and a summary.
//! Rendering is a pure function of the transcript and [`DocumentMeta`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Artifact, Attachment, AttachmentKind, Transcript};
use crate::sanitize::ConversationTitle;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Debug, Clone)]
pub struct DocumentMeta {
    pub title: ConversationTitle,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub filename: String,
    pub markdown: String,
}

/// An entity referenced from the flow, with the anchor it was given.
struct Reference<'t, T> {
    id: String,
    item: &'t T,
}

struct Flow<'t> {
    attachments: Vec<Reference<'t, Attachment>>,
    artifacts: Vec<Reference<'t, Artifact>>,
}

impl<'t> Flow<'t> {
    fn reference_attachment(&mut self, attachment: &'t Attachment) -> String {
        let id = format!("att-{}", self.attachments.len() + 1);
        self.attachments.push(Reference {
            id: id.clone(),
            item: attachment,
        });
        id
    }

    fn reference_artifact(&mut self, artifact: &'t Artifact) -> String {
        let id = format!("art-{}", self.artifacts.len() + 1);
        self.artifacts.push(Reference {
            id: id.clone(),
            item: artifact,
        });
        id
    }
}

pub fn build_document(transcript: &Transcript, meta: &DocumentMeta) -> ExportDocument {
    let mut md = String::new();
    let exported = meta.exported_at.format(TIMESTAMP_FORMAT).to_string();

    render_header(&mut md, transcript, meta, &exported);
    let flow = render_flow(&mut md, transcript);
    render_context(&mut md, transcript, &flow);
    render_summary(&mut md, transcript, &exported);

    ExportDocument {
        filename: meta.title.filename(),
        markdown: md,
    }
}

fn render_header(md: &mut String, transcript: &Transcript, meta: &DocumentMeta, exported: &str) {
    md.push_str("# 📝 Conversation with Claude\n\n");
    if let Some(title) = &meta.title.display {
        md.push_str(&format!("**Title:** {}\n\n", title));
    }
    md.push_str(&format!("**Exported:** {}\n\n", exported));
    md.push_str(&format!(
        "**Stats:** {} messages, {} responses, {} artifacts, {} attachments\n\n",
        transcript.messages.len(),
        transcript.responses.len(),
        transcript.artifacts.len(),
        transcript.attachments.len()
    ));
    md.push_str("---\n\n");
}

fn render_flow<'t>(md: &mut String, transcript: &'t Transcript) -> Flow<'t> {
    let mut flow = Flow {
        attachments: Vec::new(),
        artifacts: Vec::new(),
    };
    let turns = transcript.messages.len().max(transcript.responses.len());

    for i in 0..turns {
        if let Some(message) = transcript.messages.get(i).filter(|m| m.is_recovered()) {
            md.push_str(&format!("## 👤 Human:\n\n{}\n\n", message.content));

            let attached: Vec<&Attachment> = transcript
                .attachments
                .iter()
                .filter(|a| a.message_index == Some(message.index))
                .collect();
            if !attached.is_empty() {
                md.push_str("**📎 Attachments:**\n");
                for attachment in attached {
                    let id = flow.reference_attachment(attachment);
                    md.push_str(&attachment_line(attachment, &id));
                }
                md.push('\n');
            }
            md.push_str("---\n\n");
        }

        if let Some(response) = transcript.responses.get(i) {
            md.push_str(&format!("## 🤖 Claude:\n\n{}\n\n", response.content));

            if i + 1 == transcript.responses.len() && !transcript.artifacts.is_empty() {
                md.push_str("**🎨 Created Artifacts:**\n");
                for artifact in &transcript.artifacts {
                    let id = flow.reference_artifact(artifact);
                    md.push_str(&format!(
                        "- 📦 **{}** ({}) → See [{id}](#{id}) in Context section below\n",
                        artifact.title, artifact.language
                    ));
                }
                md.push('\n');
            }
            md.push_str("---\n\n");
        }
    }

    // Attachments no rendered human message claimed.
    let placed: Vec<usize> = transcript
        .messages
        .iter()
        .filter(|m| m.is_recovered())
        .map(|m| m.index)
        .collect();
    let others: Vec<&Attachment> = transcript
        .attachments
        .iter()
        .filter(|a| !a.message_index.is_some_and(|i| placed.contains(&i)))
        .collect();
    if !others.is_empty() {
        md.push_str("## 📎 Other Attachments\n\n");
        for attachment in others {
            let id = flow.reference_attachment(attachment);
            md.push_str(&attachment_line(attachment, &id));
        }
        md.push_str("\n---\n\n");
    }

    flow
}

fn attachment_line(attachment: &Attachment, id: &str) -> String {
    let link = format!("→ See [{id}](#{id}) in Context section below");
    match (attachment.kind, attachment.dimensions) {
        (AttachmentKind::Image, Some((w, h))) => {
            format!("- 🖼️ **{}** ({}x{}px) {}\n", attachment.filename, w, h, link)
        }
        (AttachmentKind::Image, None) => {
            format!("- 🖼️ **{}** {}\n", attachment.filename, link)
        }
        _ if attachment.has_content() => format!("- 📄 **{}** {}\n", attachment.filename, link),
        _ => format!("- 📎 **{}** {}\n", attachment.filename, link),
    }
}

fn render_context(md: &mut String, transcript: &Transcript, flow: &Flow<'_>) {
    md.push_str("\n\n# 📚 CONTEXT\n\n");
    md.push_str(
        "*This section contains the full content of all artifacts and attachments referenced above.*\n\n",
    );
    md.push_str("---\n\n");

    if !flow.attachments.is_empty() {
        md.push_str("## 📎 Uploaded Files & Attachments\n\n");
        for Reference { id, item } in &flow.attachments {
            md.push_str(&format!("<a id=\"{}\"></a>\n\n", id));
            md.push_str(&format!("### {}\n\n", item.filename));
            if let Some(content) = &item.content {
                md.push_str(&format!(
                    "**Type:** Text File | **Size:** {} characters\n\n",
                    content.chars().count()
                ));
                md.push_str(&fenced(content, ""));
            } else if let Some(url) = &item.url {
                md.push_str(&format!("**Type:** {} | **URL:** {}\n\n", item.kind, url));
            } else {
                md.push_str(&format!(
                    "**Type:** {} | *Content not available from the page*\n\n",
                    item.kind
                ));
            }
            md.push_str("---\n\n");
        }
    }

    if !flow.artifacts.is_empty() {
        md.push_str("## 🎨 Artifacts (Code, Diagrams, Components)\n\n");
        for Reference { id, item } in &flow.artifacts {
            md.push_str(&format!("<a id=\"{}\"></a>\n\n", id));
            render_artifact(md, item);
        }
    } else if !transcript.artifacts.is_empty() {
        md.push_str("## 🎨 Artifacts (Code, Diagrams, Components)\n\n");
        for artifact in &transcript.artifacts {
            render_artifact(md, artifact);
        }
    }
}

fn render_artifact(md: &mut String, artifact: &Artifact) {
    md.push_str(&format!("### {}\n\n", artifact.title));
    md.push_str(&format!(
        "**Language:** {} | **Type:** {}\n\n",
        artifact.language, artifact.kind
    ));
    md.push_str(&fenced(&artifact.content, &artifact.language));
    md.push_str("---\n\n");
}

fn render_summary(md: &mut String, transcript: &Transcript, exported: &str) {
    md.push_str("\n## 📊 Export Summary\n\n");
    md.push_str(&format!(
        "- **Messages:** {} human, {} assistant\n",
        transcript.messages.len(),
        transcript.responses.len()
    ));
    md.push_str(&format!("- **Artifacts:** {} total\n", transcript.artifacts.len()));
    md.push_str(&format!(
        "- **Attachments:** {} total ({} with full content)\n",
        transcript.attachments.len(),
        transcript.attachments_with_content()
    ));
    md.push_str(&format!("- **Export Date:** {}\n", exported));
}

/// Fenced block whose fence is longer than any backtick run in `content`.
fn fenced(content: &str, info: &str) -> String {
    let fence = "`".repeat(fence_len(content));
    format!("{fence}{info}\n{content}\n{fence}\n\n")
}

fn fence_len(content: &str) -> usize {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    (longest + 1).max(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttachmentSource, ClaudeResponse, HumanMessage};
    use chrono::TimeZone;

    fn meta() -> DocumentMeta {
        DocumentMeta {
            title: ConversationTitle::from_page_text(Some("Demo Chat")),
            exported_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn response(text: &str) -> ClaudeResponse {
        ClaudeResponse {
            content: text.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap(),
        }
    }

    #[test]
    fn fence_grows_past_embedded_backticks() {
        assert_eq!(fence_len("plain"), 3);
        assert_eq!(fence_len("```rust\n```"), 4);
        assert_eq!(fence_len("a ````` b"), 6);
    }

    #[test]
    fn header_and_filename() {
        let doc = build_document(&Transcript::default(), &meta());
        assert_eq!(doc.filename, "demo_chat_full_context.md");
        assert!(
            doc.markdown.starts_with("# 📝 Conversation with Claude\n\n**Title:** Demo Chat\n\n")
        );
        assert!(doc.markdown.contains("**Exported:** 2024-05-01 12:00:00 UTC"));
        assert!(
            doc.markdown.contains("**Stats:** 0 messages, 0 responses, 0 artifacts, 0 attachments")
        );
    }

    #[test]
    fn attachments_link_once_to_their_message() {
        let mut notes = Attachment::text(0, "notes.txt", "hello", AttachmentSource::Container);
        notes.message_index = Some(1);
        let mut lost = Attachment::text(1, "lost.txt", "bye", AttachmentSource::Container);
        lost.message_index = Some(0);
        let stored = Attachment::text(2, "stored.txt", "cached", AttachmentSource::Storage);
        let transcript = Transcript {
            messages: vec![
                HumanMessage { index: 0, content: String::new() },
                HumanMessage { index: 1, content: "second".into() },
            ],
            responses: vec![response("first answer"), response("second answer")],
            artifacts: vec![],
            attachments: vec![notes, lost, stored],
        };
        let md = build_document(&transcript, &meta()).markdown;

        assert_eq!(md.matches("## 👤 Human:").count(), 1);
        let second = md.find("second\n\n**📎 Attachments:**\n- 📄 **notes.txt** → See [att-1](#att-1)");
        assert!(second.is_some(), "{md}");
        assert!(md.contains("## 📎 Other Attachments\n\n- 📄 **lost.txt** → See [att-2](#att-2)"));
        assert!(md.contains("- 📄 **stored.txt** → See [att-3](#att-3)"));
        assert_eq!(md.matches("<a id=\"att-").count(), 3);
        assert!(md.contains("**Type:** Text File | **Size:** 5 characters\n\n```\nhello\n```"));
        assert!(md.contains("- **Attachments:** 3 total (3 with full content)"));
    }

    #[test]
    fn artifacts_without_responses_are_still_included() {
        let transcript = Transcript {
            messages: vec![HumanMessage { index: 0, content: "hi".into() }],
            responses: vec![],
            artifacts: vec![Artifact {
                index: 0,
                title: "demo".into(),
                language: "python".into(),
                content: "print(1)".into(),
                kind: crate::model::ArtifactKind::Code,
            }],
            attachments: vec![],
        };
        let md = build_document(&transcript, &meta()).markdown;
        assert!(!md.contains("art-1"));
        assert!(
            md.contains("### demo\n\n**Language:** python | **Type:** code\n\n```python\nprint(1)\n```")
        );
    }

    #[test]
    fn image_and_file_entries() {
        let image = Attachment {
            index: 0,
            kind: AttachmentKind::Image,
            filename: "chart".into(),
            content: None,
            url: Some("https://claude.ai/chart.png".into()),
            dimensions: Some((640, 480)),
            source: AttachmentSource::Image,
            message_index: None,
        };
        let file = Attachment {
            kind: AttachmentKind::File,
            filename: "report.pdf".into(),
            url: None,
            dimensions: None,
            source: AttachmentSource::Container,
            ..image.clone()
        };
        let transcript = Transcript {
            attachments: vec![image, file],
            ..Transcript::default()
        };
        let md = build_document(&transcript, &meta()).markdown;
        assert!(md.contains("- 🖼️ **chart** (640x480px) → See [att-1](#att-1)"));
        assert!(md.contains("**Type:** image | **URL:** https://claude.ai/chart.png"));
        assert!(md.contains("- 📎 **report.pdf** → See [att-2](#att-2)"));
        assert!(md.contains("**Type:** file | *Content not available from the page*"));
    }
}
