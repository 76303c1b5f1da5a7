//! Single-page HTML for the web shell.
//!
//! The page has a fixed sidebar (instructions + upload form) and a main panel
//! whose content depends on the [`View`]: the idle prompt, a rejection
//! notice, or the uploaded image with its report in an expandable panel.

use super::markdown::{escape_html, to_html};
use crate::output::AnalysisOutcome;
use crate::pipeline::upload::{accept_attribute, UploadedImage};

/// Shown whenever no file has been uploaded.
pub const IDLE_MESSAGE: &str = "ℹ️ Please upload a medical image in the sidebar to begin analysis.";

/// Shown under a successful report.
pub const COMPLETE_MESSAGE: &str = "✅ Analysis complete! Scroll to view the report.";

/// Main-panel state for one render.
pub enum View<'a> {
    /// Nothing uploaded yet.
    Idle,
    /// Upload refused before any pipeline work (type not allowed, bad form).
    Rejected { message: String },
    /// The pipeline ran; the outcome may still be a capability error.
    Analyzed {
        upload: &'a UploadedImage,
        outcome: &'a AnalysisOutcome,
    },
    /// The upload was admitted but could not be read as an image.
    Unreadable {
        upload: &'a UploadedImage,
        message: String,
    },
}

const STYLE: &str = r#"
body { margin: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background-color: #f5f7fa; color: #2c3e50; }
.layout { display: flex; min-height: 100vh; }
.sidebar { width: 320px; background-color: #ffffff; padding: 1.5rem; box-shadow: 0 2px 5px rgba(0,0,0,0.1); }
.main { flex: 1; padding: 2rem 3rem; }
.main-title { font-size: 2.5rem; text-align: center; margin-bottom: 1rem; }
.info { background: #e8f4fd; border-radius: 8px; padding: 1rem; }
.success { background: #e6f6ec; border-radius: 8px; padding: 1rem; margin-top: 1rem; }
.error { background: #fdecea; border-radius: 8px; padding: 1rem; margin-bottom: 1rem; }
button { background-color: #3498db; color: white; border: 0; border-radius: 8px; padding: 0.5rem 1rem; font-weight: bold; cursor: pointer; margin-top: 1rem; }
button:hover { background-color: #2980b9; }
button:disabled { background-color: #a9c7e0; cursor: not-allowed; }
.preview { max-width: 66%; }
.preview img { width: 100%; border-radius: 8px; }
.preview figcaption { color: #7f8c8d; font-size: 0.9rem; text-align: center; }
details { margin-top: 1.5rem; }
summary { font-weight: bold; cursor: pointer; font-size: 1.1rem; }
.report-section { background-color: #ffffff; padding: 1.5rem; border-radius: 10px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); margin-top: 1rem; }
.report-section table { border-collapse: collapse; }
.report-section td, .report-section th { border: 1px solid #ddd; padding: 0.3rem 0.6rem; }
.analysis-error { color: #c0392b; font-weight: bold; }
.stats { color: #7f8c8d; font-size: 0.85rem; margin-top: 1rem; }
#busy { display: none; text-align: center; color: #3498db; margin-top: 1rem; }
"#;

const SCRIPT: &str = r#"
const input = document.getElementById('image');
const button = document.getElementById('analyze');
const uploaded = document.getElementById('uploaded');
const localPreview = document.getElementById('local-preview');
const localImage = document.getElementById('local-preview-img');
input.addEventListener('change', () => {
  const chosen = input.files.length > 0;
  button.disabled = !chosen;
  uploaded.style.display = chosen ? 'block' : 'none';
  if (localImage.src) {
    URL.revokeObjectURL(localImage.src);
    localImage.removeAttribute('src');
  }
  if (chosen) {
    localImage.src = URL.createObjectURL(input.files[0]);
    localImage.alt = input.files[0].name;
  }
  localPreview.style.display = chosen ? 'block' : 'none';
});
document.getElementById('upload-form').addEventListener('submit', () => {
  button.disabled = true;
  document.getElementById('busy').style.display = 'block';
});
"#;

/// Render the full page for `view`.
pub fn render_page(view: &View<'_>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Medical Image Analysis</title>
<link rel="icon" href="data:image/svg+xml,<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 100 100'><text y='.9em' font-size='90'>🩺</text></svg>">
<style>{style}</style>
</head>
<body>
<div class="layout">
{sidebar}
<main class="main">
<h1 class="main-title">🩺 Medical Image Analysis Tool 🔬</h1>
<p>Welcome to the <strong>Medical Image Analysis Tool</strong>! Upload a medical image (X-ray, MRI, CT, Ultrasound, etc.),
and our AI-powered system will provide a detailed analysis, including findings, diagnosis, and research insights.</p>
<figure id="local-preview" class="preview" style="display:none">
<img id="local-preview-img" alt="">
<figcaption>Uploaded Medical Image</figcaption>
</figure>
<div id="busy">🔍 Analyzing the image... This may take a moment.</div>
{main}
</main>
</div>
<script>{script}</script>
</body>
</html>
"#,
        style = STYLE,
        sidebar = sidebar(),
        main = main_panel(view),
        script = SCRIPT,
    )
}

fn sidebar() -> String {
    format!(
        r#"<aside class="sidebar">
<h2>📤 Upload Medical Image</h2>
<p><strong>Instructions</strong>:</p>
<ol>
<li>Upload an image in JPG, JPEG, PNG, BMP, or GIF format.</li>
<li>Click <strong>Analyze Image</strong> to start the analysis.</li>
<li>View the detailed report in the main panel.</li>
</ol>
<form id="upload-form" action="/analyze" method="post" enctype="multipart/form-data">
<label for="image">Choose a medical image file</label><br>
<input id="image" type="file" name="image" accept="{accept}" title="Supported formats: JPG, JPEG, PNG, BMP, GIF">
<div id="uploaded" class="success" style="display:none">✅ Image uploaded successfully!</div>
<button id="analyze" type="submit" disabled>Analyze Image</button>
</form>
</aside>"#,
        accept = accept_attribute(),
    )
}

fn main_panel(view: &View<'_>) -> String {
    match view {
        View::Idle => idle(),
        View::Rejected { message } => format!(
            r#"<div class="error">🚫 {}</div>{}"#,
            escape_html(message),
            idle()
        ),
        View::Analyzed { upload, outcome } => {
            let mut body = preview(upload);
            body.push_str(&report_panel(outcome));
            if outcome.is_report() {
                body.push_str(&format!(r#"<div class="success">{COMPLETE_MESSAGE}</div>"#));
            }
            body
        }
        View::Unreadable { upload, message } => format!(
            r#"<p><em>{}</em></p>
<details open>
<summary>📋 View Analysis Report</summary>
<div class="report-section"><p class="analysis-error">⚠️ {}</p></div>
</details>"#,
            escape_html(&upload.label()),
            escape_html(message)
        ),
    }
}

fn idle() -> String {
    format!(r#"<div class="info">{IDLE_MESSAGE}</div>"#)
}

fn preview(upload: &UploadedImage) -> String {
    format!(
        r#"<figure class="preview">
<img src="{src}" alt="{alt}">
<figcaption>Uploaded Medical Image</figcaption>
</figure>"#,
        src = upload.data_uri(),
        alt = escape_html(&upload.label()),
    )
}

fn report_panel(outcome: &AnalysisOutcome) -> String {
    let content = match outcome {
        AnalysisOutcome::Report(report) => {
            let mut html = to_html(&report.markdown);
            if !report.sources.is_empty() {
                html.push_str("<h4>Web sources</h4>\n<ul>\n");
                for s in &report.sources {
                    html.push_str(&format!(
                        r#"<li><a href="{}" target="_blank" rel="noopener noreferrer">{}</a></li>"#,
                        escape_html(&s.uri),
                        escape_html(&s.title)
                    ));
                    html.push('\n');
                }
                html.push_str("</ul>\n");
            }
            let st = &report.stats;
            html.push_str(&format!(
                r#"<p class="stats">{} · {}×{} → {}×{} px · {} tokens in / {} out · {:.1}s</p>"#,
                escape_html(&st.model),
                st.source_width,
                st.source_height,
                st.normalized_width,
                st.normalized_height,
                st.input_tokens,
                st.output_tokens,
                st.duration_ms as f64 / 1000.0
            ));
            html
        }
        AnalysisOutcome::Error(_) => format!(
            r#"<p class="analysis-error">{}</p>"#,
            escape_html(&outcome.display_text())
        ),
    };
    format!(
        r#"<details open>
<summary>📋 View Analysis Report</summary>
<div class="report-section">
{content}
</div>
</details>"#
    )
}
