//! Pipeline integration tests with a scripted capability.
//!
//! No network: the capability records every request it receives and answers
//! with a canned result, so these run everywhere.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GenericImageView, ImageFormat, Rgb, RgbImage};
use medimg_report::pipeline::upload::list_dir;
use medimg_report::{
    analyze_bytes, analyze_to_file_as, AnalysisCapability, AnalysisConfig, AnalysisOutcome, AnalysisProgressCallback,
    AnalysisStage, Analyzer, CapabilityError, CapabilityRequest, CapabilityResponse, ImageKind,
    MedImgError, OutputFormat, UploadedImage,
};
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Capability that replays one canned answer and records what it was sent.
struct Scripted {
    answer: Result<CapabilityResponse, CapabilityError>,
    search: bool,
    requests: Mutex<Vec<CapabilityRequest>>,
}

impl Scripted {
    fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(CapabilityResponse {
                text: text.to_string(),
                input_tokens: 1200,
                output_tokens: 640,
                sources: vec![],
            }),
            search: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(err: CapabilityError) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(err),
            search: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn sent_images(&self) -> Vec<Vec<u8>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| STANDARD.decode(&r.image.data).unwrap())
            .collect()
    }
}

#[async_trait]
impl AnalysisCapability for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-vision-1"
    }

    fn supports_web_search(&self) -> bool {
        self.search
    }

    async fn analyze(
        &self,
        request: &CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError> {
        self.requests.lock().unwrap().push(request.clone());
        self.answer.clone()
    }
}

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

/// A gradient so the resize actually has something to interpolate.
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

fn config_for(capability: Arc<Scripted>, temp_dir: &Path) -> AnalysisConfig {
    AnalysisConfig::builder()
        .capability(capability)
        .temp_dir(temp_dir)
        .build()
        .unwrap()
}

const REPORT: &str = "### 1. Image Type & Region\n- Chest X-ray, PA view\n\n\
### 2. Key Findings\n- No focal consolidation\n\n\
### 3. Diagnostic Assessment\n- Normal study (high confidence)\n\n\
### 4. Patient-Friendly Explanation\nYour lungs look healthy.\n\n\
### 5. Research Context\n- Fleischner Society guidelines\n";

// ── Normalization ────────────────────────────────────────────────────────────

#[tokio::test]
async fn wide_image_is_sent_at_500_by_250() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cap = Scripted::ok(REPORT);
    let config = config_for(cap.clone(), dir.path());

    let png = encode(gradient(1000, 500), ImageFormat::Png);
    let outcome = analyze_bytes(&png, "image/png", &config).await.unwrap();

    let report = outcome.report().expect("expected a report");
    assert_eq!(report.stats.source_width, 1000);
    assert_eq!(report.stats.source_height, 500);
    assert_eq!(report.stats.normalized_width, 500);
    assert_eq!(report.stats.normalized_height, 250);

    let sent = cap.sent_images();
    assert_eq!(sent.len(), 1);
    let decoded = image::load_from_memory_with_format(&sent[0], ImageFormat::Png).unwrap();
    assert_eq!(decoded.dimensions(), (500, 250));
    assert_eq!(cap.requests.lock().unwrap()[0].image.mime_type, "image/png");
}

#[tokio::test]
async fn narrow_and_tall_images_keep_aspect_ratio() {
    let dir = tempfile::tempdir().unwrap();
    let cap = Scripted::ok(REPORT);
    let config = config_for(cap.clone(), dir.path());

    // Upscaled: 200×300 → 500×750.
    let jpg = encode(gradient(200, 300), ImageFormat::Jpeg);
    let outcome = analyze_bytes(&jpg, "image/jpeg", &config).await.unwrap();
    let stats = &outcome.report().unwrap().stats;
    assert_eq!((stats.normalized_width, stats.normalized_height), (500, 750));

    // A thin strip still gets at least one row.
    let bmp = encode(gradient(3000, 2), ImageFormat::Bmp);
    let outcome = analyze_bytes(&bmp, "image/bmp", &config).await.unwrap();
    let stats = &outcome.report().unwrap().stats;
    assert_eq!((stats.normalized_width, stats.normalized_height), (500, 1));
}

#[tokio::test]
async fn repeated_analysis_sends_identical_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let cap = Scripted::ok(REPORT);
    let analyzer = Analyzer::new(config_for(cap.clone(), dir.path())).unwrap();

    let upload = UploadedImage::new(encode(gradient(640, 480), ImageFormat::Png), ImageKind::Png);
    analyzer.analyze_upload(&upload).await.unwrap();
    analyzer.analyze_upload(&upload).await.unwrap();

    let sent = cap.sent_images();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

// ── Request contents ─────────────────────────────────────────────────────────

#[tokio::test]
async fn prompt_names_all_five_sections() {
    let dir = tempfile::tempdir().unwrap();
    let cap = Scripted::ok(REPORT);
    let config = config_for(cap.clone(), dir.path());

    let gif = encode(gradient(100, 100), ImageFormat::Gif);
    analyze_bytes(&gif, "image/gif", &config).await.unwrap();

    let requests = cap.requests.lock().unwrap();
    let prompt = &requests[0].prompt;
    for section in medimg_report::prompts::REPORT_SECTIONS {
        assert!(prompt.contains(section), "prompt is missing {section:?}");
    }
    assert!(requests[0].web_search);
}

#[tokio::test]
async fn report_text_is_returned_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let cap = Scripted::ok(REPORT);
    let config = config_for(cap, dir.path());

    let png = encode(gradient(800, 600), ImageFormat::Png);
    let outcome = analyze_bytes(&png, "image/png", &config).await.unwrap();

    assert_eq!(outcome.display_text(), REPORT);
    let stats = &outcome.report().unwrap().stats;
    assert_eq!(stats.model, "scripted-vision-1");
    assert_eq!(stats.input_tokens, 1200);
    assert_eq!(stats.output_tokens, 640);
}

#[tokio::test]
async fn json_output_file_holds_tagged_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let config = config_for(Scripted::ok(REPORT), dir.path());

    let input = out_dir.path().join("chest.png");
    std::fs::write(&input, encode(gradient(1000, 500), ImageFormat::Png)).unwrap();
    let output = out_dir.path().join("report.json");

    let outcome = analyze_to_file_as(&input, &output, OutputFormat::Json, &config)
        .await
        .unwrap();
    assert!(outcome.is_report());

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["status"], "report");
    assert_eq!(written["markdown"], REPORT);
    assert_eq!(written["stats"]["normalized_height"], 250);
}

// ── Failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn capability_failure_becomes_prefixed_outcome() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let cap = Scripted::failing(CapabilityError::Http {
        provider: "scripted".into(),
        status: 503,
        message: "The model is overloaded".into(),
    });
    let config = config_for(cap.clone(), dir.path());

    let png = encode(gradient(600, 400), ImageFormat::Png);
    let outcome = analyze_bytes(&png, "image/png", &config).await.unwrap();

    assert!(matches!(outcome, AnalysisOutcome::Error(_)));
    let text = outcome.display_text();
    assert!(text.starts_with("⚠️ Analysis error:"), "got: {text}");
    assert!(text.contains("overloaded"));
    assert_eq!(cap.calls(), 1);
}

#[tokio::test]
async fn session_keeps_working_after_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let failing = Analyzer::new(config_for(
        Scripted::failing(CapabilityError::Transport {
            provider: "scripted".into(),
            detail: "connection reset".into(),
        }),
        dir.path(),
    ))
    .unwrap();
    let working = Analyzer::new(config_for(Scripted::ok(REPORT), dir.path())).unwrap();

    let upload = UploadedImage::new(encode(gradient(300, 300), ImageFormat::Png), ImageKind::Png);
    assert!(!failing.analyze_upload(&upload).await.unwrap().is_report());
    assert!(working.analyze_upload(&upload).await.unwrap().is_report());
}

#[tokio::test]
async fn undecodable_upload_never_reaches_capability() {
    let dir = tempfile::tempdir().unwrap();
    let cap = Scripted::ok(REPORT);
    let config = config_for(cap.clone(), dir.path());

    let err = analyze_bytes(b"definitely not a png", "image/png", &config)
        .await
        .unwrap_err();

    assert!(matches!(err, MedImgError::ImageDecode { .. }), "got: {err:?}");
    assert!(err.to_string().starts_with("Could not read image"));
    assert_eq!(cap.calls(), 0);
}

#[tokio::test]
async fn disallowed_type_is_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let cap = Scripted::ok(REPORT);
    let config = config_for(cap.clone(), dir.path());

    let err = analyze_bytes(b"%PDF-1.7", "application/pdf", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, MedImgError::UnsupportedType { .. }));
    assert_eq!(cap.calls(), 0);
}

// ── Transient files ──────────────────────────────────────────────────────────

#[tokio::test]
async fn no_temp_files_left_on_any_path() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let ok = config_for(Scripted::ok(REPORT), dir.path());
    let png = encode(gradient(1000, 500), ImageFormat::Png);
    analyze_bytes(&png, "image/png", &ok).await.unwrap();
    assert!(list_dir(dir.path()).unwrap().is_empty(), "success left files");

    let failing = config_for(
        Scripted::failing(CapabilityError::EmptyResponse {
            provider: "scripted".into(),
        }),
        dir.path(),
    );
    analyze_bytes(&png, "image/png", &failing).await.unwrap();
    assert!(list_dir(dir.path()).unwrap().is_empty(), "failure left files");

    analyze_bytes(b"garbage", "image/jpeg", &ok).await.unwrap_err();
    assert!(list_dir(dir.path()).unwrap().is_empty(), "decode error left files");
}

#[tokio::test]
async fn concurrent_analyses_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let cap = Scripted::ok(REPORT);
    let analyzer = Arc::new(Analyzer::new(config_for(cap.clone(), dir.path())).unwrap());

    let mut handles = Vec::new();
    for width in [320u32, 640, 960, 1280] {
        let analyzer = Arc::clone(&analyzer);
        handles.push(tokio::spawn(async move {
            let bytes = encode(gradient(width, width / 2), ImageFormat::Png);
            let upload = UploadedImage::new(bytes, ImageKind::Png);
            analyzer.analyze_upload(&upload).await
        }));
    }
    for h in handles {
        let outcome = h.await.unwrap().unwrap();
        let stats = &outcome.report().unwrap().stats;
        assert_eq!((stats.normalized_width, stats.normalized_height), (500, 250));
    }
    assert_eq!(cap.calls(), 4);
    assert!(list_dir(dir.path()).unwrap().is_empty());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl AnalysisProgressCallback for Recorder {
    fn on_analysis_start(&self, source: &str) {
        self.events.lock().unwrap().push(format!("start {source}"));
    }
    fn on_stage(&self, stage: AnalysisStage) {
        self.events.lock().unwrap().push(format!("{stage:?}"));
    }
    fn on_analysis_complete(&self, success: bool, _elapsed_ms: u64) {
        self.events.lock().unwrap().push(format!("done {success}"));
    }
}

#[tokio::test]
async fn progress_reports_stages_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = AnalysisConfig::builder()
        .capability(Scripted::ok(REPORT))
        .temp_dir(dir.path())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let upload = UploadedImage::new(encode(gradient(50, 50), ImageFormat::Png), ImageKind::Png)
        .with_file_name("wrist.png");
    Analyzer::new(config).unwrap().analyze_upload(&upload).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start wrist.png",
            "Materializing",
            "Normalizing",
            "Requesting",
            "done true"
        ]
    );
}
