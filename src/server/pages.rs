//! HTML pages for the step-by-step web flow.
//!
//! Each page carries the sanitized sequence in a hidden field so the next
//! step can rebuild the run; no pipeline state is kept on the server.

use crate::boulder::BoulderRecord;
use crate::pipeline::{ArtifactReport, DesignStage, PipelineRun, SearchStage};
use crate::render::StageCommand;

const APP_TITLE: &str = "PCR Workshop";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(sub_title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - {sub}</title>
<style>
body {{ font-family: sans-serif; max-width: 60rem; margin: 2rem auto; }}
pre {{ background: #f4f4f4; padding: 0.75rem; overflow-x: auto; }}
.cached {{ color: #2a7a2a; font-size: 0.85rem; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 0.25rem 0.5rem; text-align: left; }}
</style>
</head>
<body>
<h1>{title}</h1>
<h2>{sub}</h2>
{body}
</body>
</html>
"#,
        title = APP_TITLE,
        sub = escape_html(sub_title),
        body = body
    )
}

/// A form that posts the sequence to the next step.
fn next_step(action: &str, label: &str, sequence: &str) -> String {
    format!(
        r#"<form method="post" action="{action}">
<input type="hidden" name="sequence" value="{sequence}">
<button type="submit">{label}</button>
</form>"#,
        action = action,
        sequence = escape_html(sequence),
        label = escape_html(label)
    )
}

fn artifact_block(heading: &str, artifact: &ArtifactReport) -> String {
    let badge = if artifact.cached {
        r#" <span class="cached">(cached)</span>"#
    } else {
        ""
    };
    format!(
        "<h3>{}{}</h3>\n<p><code>{}</code></p>\n<pre>{}</pre>\n",
        escape_html(heading),
        badge,
        escape_html(&artifact.path.to_string_lossy()),
        escape_html(&artifact.content)
    )
}

fn command_block(command: &StageCommand) -> String {
    format!(
        "<h3>{} command</h3>\n<pre>{}</pre>\n",
        escape_html(command.stage.tool_name()),
        escape_html(&command.command_line)
    )
}

fn primers_table(primers: &BoulderRecord) -> String {
    let rows: String = primers
        .iter()
        .map(|(key, value)| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape_html(key),
                escape_html(value)
            )
        })
        .collect();
    format!("<table>\n<tr><th>Key</th><th>Value</th></tr>\n{}</table>\n", rows)
}

pub fn index_page() -> String {
    layout(
        "Sequence",
        r#"<form method="post" action="/setup">
<label for="sequence">DNA sequence</label><br>
<textarea id="sequence" name="sequence" rows="12" cols="80"></textarea><br>
<button type="submit">Set up run</button>
</form>"#,
    )
}

pub fn setup_page(run: &PipelineRun) -> String {
    let paths = &run.workspace;
    let body = format!(
        "<p>Identity: <code>{identity}</code></p>\n\
         <p>Sequence ({len} bases):</p>\n<pre>{sequence}</pre>\n\
         <ul>\n\
         <li>Workspace: <code>{dir}</code></li>\n\
         <li>primer3 template: <code>{dt}</code></li>\n\
         <li>primer3 output: <code>{dout}</code></li>\n\
         <li>primersearch template: <code>{st}</code></li>\n\
         <li>primersearch output: <code>{sout}</code></li>\n\
         </ul>\n{next}",
        identity = escape_html(&run.identity),
        len = run.sequence.len(),
        sequence = escape_html(&run.sequence),
        dir = escape_html(&paths.directory.to_string_lossy()),
        dt = escape_html(&paths.design_template.to_string_lossy()),
        dout = escape_html(&paths.design_output.to_string_lossy()),
        st = escape_html(&paths.search_template.to_string_lossy()),
        sout = escape_html(&paths.search_output.to_string_lossy()),
        next = next_step("/primer3-template", "Create primer3 template", &run.sequence),
    );
    layout("Sequence Setup", &body)
}

pub fn design_template_page(run: &PipelineRun, template: &ArtifactReport, command: &StageCommand) -> String {
    let body = format!(
        "{}{}{}",
        artifact_block("primer3 template", template),
        command_block(command),
        next_step("/primer3-run", "Run primer3", &run.sequence)
    );
    layout("Primer3 Template", &body)
}

pub fn design_output_page(
    run: &PipelineRun,
    design: &DesignStage,
    search_template: &ArtifactReport,
    search_command: &StageCommand,
) -> String {
    let body = format!(
        "{}<h3>Parsed primer3 output</h3>\n{}{}{}{}",
        artifact_block("primer3 output", &design.output),
        primers_table(&design.primers),
        artifact_block("primersearch template", search_template),
        command_block(search_command),
        next_step("/primersearch-run", "Run primersearch", &run.sequence)
    );
    layout("Primer3 Output", &body)
}

pub fn search_output_page(run: &PipelineRun, search: &SearchStage) -> String {
    let body = format!(
        "<p>Identity: <code>{}</code></p>\n{}<p><a href=\"/\">Start again</a></p>",
        escape_html(&run.identity),
        artifact_block("primersearch output", &search.output)
    );
    layout("Primersearch Output", &body)
}

pub fn error_page(message: &str) -> String {
    layout(
        "Error",
        &format!("<pre>{}</pre>\n<p><a href=\"/\">Start again</a></p>", escape_html(message)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_index_page_posts_to_setup() {
        let page = index_page();
        assert!(page.contains(r#"action="/setup""#));
        assert!(page.contains(r#"name="sequence""#));
    }

    #[test]
    fn test_setup_page_carries_sequence_forward() {
        let dir = tempfile::tempdir().unwrap();
        let run = PipelineRun::setup(dir.path(), "acgt");
        let page = setup_page(&run);
        assert!(page.contains(&run.identity));
        assert!(page.contains(r#"action="/primer3-template""#));
        assert!(page.contains(r#"value="ACGT""#));
    }

    #[test]
    fn test_error_page_escapes_message() {
        let page = error_page("<script>");
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}
