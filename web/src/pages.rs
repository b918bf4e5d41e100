//! HTML pages rendered by the shell itself (the reports come from the
//! pipeline).

use crate::state::RunRecord;
use datasift_processing::reporting::escape_html;
use std::fmt::Write;

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;margin:3rem auto;max-width:720px;color:#222}\
form{display:grid;gap:.8rem;padding:1rem;border:1px solid #ddd;border-radius:6px}\
label{font-weight:600}input[type=url]{width:100%;padding:.3rem}\
button{justify-self:start;padding:.4rem 1.2rem}\
.error{background:#fdecea;border:1px solid #f5c2c0;padding:.6rem .8rem;border-radius:4px}\
.code{font-family:monospace;color:#8a1f11}.meta{color:#666;font-size:.85rem}\
table{border-collapse:collapse;margin-top:.5rem}td,th{padding:.2rem .6rem;text-align:left}";

/// An error shown above the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormError {
    pub code: String,
    pub message: String,
}

/// The input form: one file field, one URL field.
pub fn form_page(error: Option<&FormError>, recent: &[RunRecord]) -> String {
    let mut html = String::with_capacity(4 * 1024);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>CSV Profiler</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>CSV Profiler</h1>\n\
         <p>Upload a CSV file or give the URL of one. Duplicate rows and rows \
         with missing values are removed before profiling.</p>\n"
    );

    if let Some(error) = error {
        let _ = writeln!(
            html,
            "<div class=\"error\" role=\"alert\"><span class=\"code\">{}</span> {}</div>",
            escape_html(&error.code),
            escape_html(&error.message)
        );
    }

    html.push_str(
        "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\n\
         <label for=\"file\">CSV file</label>\n\
         <input type=\"file\" id=\"file\" name=\"file\" accept=\".csv,text/csv\">\n\
         <label for=\"url\">or URL</label>\n\
         <input type=\"url\" id=\"url\" name=\"url\" placeholder=\"https://example.com/data.csv\">\n\
         <button type=\"submit\">Profile</button>\n\
         </form>\n",
    );

    if !recent.is_empty() {
        html.push_str("<h2>Recent runs</h2>\n<table>\n");
        html.push_str("<tr><th>Finished</th><th>Source</th><th>Rows</th><th></th></tr>\n");
        for run in recent {
            let _ = writeln!(
                html,
                "<tr><td class=\"meta\">{}</td><td>{}</td><td>{} &rarr; {}</td>\
                 <td><a href=\"/runs/{id}/report\">report</a> \
                 <a href=\"/runs/{id}/download\">csv</a></td></tr>",
                run.finished_at.format("%Y-%m-%d %H:%M:%S"),
                escape_html(&run.source),
                run.rows_loaded,
                run.rows_after,
                id = run.run_id
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// A short page for 404s and similar dead ends.
pub fn message_page(title: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>{title}</h1>\n<p>{message}</p>\n<p><a href=\"/\">Back to the form</a></p>\n\
         </body>\n</html>\n",
        title = escape_html(title),
        message = escape_html(message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_has_file_and_url_fields() {
        let html = form_page(None, &[]);
        assert!(html.contains("name=\"file\""));
        assert!(html.contains("name=\"url\""));
        assert!(html.contains("enctype=\"multipart/form-data\""));
        assert!(!html.contains("role=\"alert\""));
        assert!(!html.contains("Recent runs"));
    }

    #[test]
    fn test_form_error_is_escaped() {
        let error = FormError {
            code: "PARSE_ERROR".to_string(),
            message: "bad <script>".to_string(),
        };
        let html = form_page(Some(&error), &[]);
        assert!(html.contains("PARSE_ERROR"));
        assert!(html.contains("bad &lt;script&gt;"));
        assert!(!html.contains("bad <script>"));
    }

    #[test]
    fn test_message_page() {
        let html = message_page("Not Found", "No report yet");
        assert!(html.contains("<h1>Not Found</h1>"));
        assert!(html.contains("No report yet"));
    }
}
