//! Server-rendered HTML pages.

use export::{Block, ExportFormat, parse_blocks};
use extract::truncate_chars;
use html_escape::{encode_double_quoted_attribute, encode_text};
use report::Report;
use uuid::Uuid;

const STEP1_PREVIEW_CHARS: usize = 1_200;

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2em auto;padding:0 1em;line-height:1.6}\
textarea,input[type=text]{width:100%;box-sizing:border-box}\
textarea{min-height:14em}\
table{border-collapse:collapse;margin:1em 0}td,th{border:1px solid #999;padding:.3em .6em}\
.error{color:#b00020}.keys{color:#555;font-size:.9em}.downloads a{margin-right:1em}";

/// State of the input form, including anything the user already typed.
#[derive(Debug, Default)]
pub struct FormView {
    pub company_name: String,
    pub job_posting_text: String,
    pub errors: Vec<String>,
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        encode_text(title),
        STYLE,
        body
    )
}

pub fn index_page(form: &FormView, key_status: &[(&'static str, String)]) -> String {
    let mut body = String::from("<h1>Company Analysis Report</h1>\n");

    body.push_str("<p class=\"keys\">");
    for (name, masked) in key_status {
        body.push_str(&format!("{}: <code>{}</code> ", name, encode_text(masked)));
    }
    body.push_str("</p>\n");

    for error in &form.errors {
        body.push_str(&format!("<p class=\"error\">{}</p>\n", encode_text(error)));
    }

    body.push_str(&format!(
        "<form method=\"post\" action=\"/analyze\">\n\
         <p><label>Company name<br><input type=\"text\" name=\"company_name\" value=\"{}\"></label></p>\n\
         <p><label>Job posting<br><textarea name=\"job_posting_text\">{}</textarea></label></p>\n\
         <p><button type=\"submit\">Generate report</button></p>\n\
         </form>",
        encode_double_quoted_attribute(&form.company_name),
        encode_text(&form.job_posting_text)
    ));

    page("Company Analysis Report", &body)
}

pub fn report_page(id: Uuid, report: &Report) -> String {
    let title = format!("{} Company Analysis Report", report.company_name);
    let mut body = format!(
        "<h1>{}</h1>\n<p>Generated {}</p>\n",
        encode_text(&title),
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    body.push_str("<p class=\"downloads\">");
    for format in ExportFormat::ALL {
        body.push_str(&format!(
            "<a href=\"/reports/{}/export/{}\">Download {}</a>",
            id,
            format.extension(),
            format.label()
        ));
    }
    body.push_str("</p>\n");

    body.push_str(&format!(
        "<p>Stage 1: {} chars / Stage 2: {} chars</p>\n",
        report.step1_output.char_count(),
        report.step2_output.char_count()
    ));

    body.push_str("<section>\n");
    body.push_str(&markdown_to_html(&report.step2_output.text));
    body.push_str("</section>\n");

    let preview = truncate_chars(&report.step1_output.text, STEP1_PREVIEW_CHARS);
    body.push_str(&format!(
        "<details><summary>Stage 1 draft (first {} chars)</summary><pre>{}</pre></details>\n",
        STEP1_PREVIEW_CHARS,
        encode_text(preview)
    ));
    body.push_str("<p><a href=\"/\">New analysis</a></p>");

    page(&title, &body)
}

pub fn not_found_page() -> String {
    page(
        "Report not found",
        "<h1>Report not found</h1>\n<p>The report may have expired.</p>\n<p><a href=\"/\">New analysis</a></p>",
    )
}

pub fn markdown_to_html(text: &str) -> String {
    let mut html = String::new();
    for block in parse_blocks(text) {
        match block {
            Block::Heading { level, text } => {
                html.push_str(&format!("<h{0}>{1}</h{0}>\n", level + 1, encode_text(&text)));
            }
            Block::Paragraph(text) => {
                html.push_str(&format!("<p>{}</p>\n", encode_text(&text)));
            }
            Block::Table { rows } => {
                html.push_str("<table>\n");
                for (i, row) in rows.iter().enumerate() {
                    let tag = if i == 0 { "th" } else { "td" };
                    html.push_str("<tr>");
                    for cell in row {
                        html.push_str(&format!("<{0}>{1}</{0}>", tag, encode_text(cell)));
                    }
                    html.push_str("</tr>\n");
                }
                html.push_str("</table>\n");
            }
            Block::Blank => {}
        }
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use report::{StageMetadata, StageOutput};

    #[test]
    fn test_markdown_to_html() {
        let html = markdown_to_html("# Title\nA <b> tag\n\n| H | I |\n|---|---|\n| **x** | y |");
        assert!(html.contains("<h2>Title</h2>"));
        assert!(html.contains("<p>A &lt;b&gt; tag</p>"));
        assert!(html.contains("<tr><th>H</th><th>I</th></tr>"));
        assert!(html.contains("<tr><td>x</td><td>y</td></tr>"));
    }

    #[test]
    fn test_index_page_keeps_input_escaped() {
        let form = FormView {
            company_name: "Acme \"Corp\"".to_string(),
            job_posting_text: "</textarea><script>".to_string(),
            errors: vec!["Company name is too short".to_string()],
        };
        let html = index_page(&form, &[("OPENAI_API_KEY", "sk-a****mnop".to_string())]);

        assert!(html.contains("value=\"Acme &quot;Corp&quot;\""));
        assert!(html.contains("&lt;/textarea&gt;&lt;script&gt;"));
        assert!(html.contains("class=\"error\">Company name is too short"));
        assert!(html.contains("sk-a****mnop"));
    }

    #[test]
    fn test_report_page_has_downloads_and_preview() {
        let id = Uuid::new_v4();
        let report = Report {
            company_name: "Acme".to_string(),
            step1_output: StageOutput {
                text: "d".repeat(2_000),
                metadata: StageMetadata::default(),
            },
            step2_output: StageOutput {
                text: "## Summary\nAcme grows.".to_string(),
                metadata: StageMetadata::default(),
            },
            generated_at: chrono::Utc::now(),
        };
        let html = report_page(id, &report);

        for ext in ["json", "docx", "pdf"] {
            assert!(html.contains(&format!("/reports/{id}/export/{ext}")));
        }
        assert!(html.contains("Stage 1: 2000 chars"));
        assert!(html.contains(&format!("<pre>{}</pre>", "d".repeat(1_200))));
        assert!(html.contains("<h3>Summary</h3>"));
    }
}
