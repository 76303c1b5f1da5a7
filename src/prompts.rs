//! Instruction text sent alongside every medical image.
//!
//! All prompt wording lives here so the requester never has to change when the
//! report layout does, and so tests can inspect the prompt without a model.
//!
//! Callers can override the default via
//! [`crate::config::AnalysisConfig::prompt`]; the constants here are used only
//! when no override is provided.

/// Section headings the report is asked to contain, in order.
pub const REPORT_SECTIONS: [&str; 5] = [
    "1. Image Type & Region",
    "2. Key Findings",
    "3. Diagnostic Assessment",
    "4. Patient-Friendly Explanation",
    "5. Research Context",
];

/// Default analysis prompt. `{research}` is replaced by
/// [`RESEARCH_WITH_SEARCH`] or [`RESEARCH_WITHOUT_SEARCH`].
pub const MEDICAL_ANALYSIS_PROMPT: &str = r#"You are a highly skilled medical imaging expert with extensive knowledge in radiology and diagnostic imaging. Analyze the medical image and structure your response as follows:

### 1. Image Type & Region
- Identify the imaging modality (X-ray/MRI/CT/Ultrasound/etc.).
- Specify the anatomical region and positioning.
- Evaluate image quality and technical adequacy.

### 2. Key Findings
- Highlight primary observations systematically.
- Identify potential abnormalities with detailed descriptions.
- Include measurements and density where relevant.

### 3. Diagnostic Assessment
- Provide a primary diagnosis with confidence level.
- List differential diagnoses ranked by likelihood.
- Support each diagnosis with observed evidence.
- Highlight critical/urgent findings.

### 4. Patient-Friendly Explanation
- Simplify findings in clear, non-technical language.
- Avoid medical jargon or provide easy definitions.
- Include relatable visual analogies.

### 5. Research Context
{research}

Ensure a structured and medically accurate response using clear markdown formatting."#;

/// Research instructions when the capability has a web-search tool.
pub const RESEARCH_WITH_SEARCH: &str = "- Use web search to find recent medical literature.
- Search for standard treatment protocols.
- Provide 2-3 key references supporting the analysis.";

/// Research instructions when no search tool is available.
pub const RESEARCH_WITHOUT_SEARCH: &str = "- Summarise relevant medical literature you are aware of.
- Outline standard treatment protocols.
- Provide 2-3 key references supporting the analysis, noting that they were not verified online.";

/// Build the default prompt for a capability with or without web search.
pub fn build_prompt(web_search: bool) -> String {
    let research = if web_search {
        RESEARCH_WITH_SEARCH
    } else {
        RESEARCH_WITHOUT_SEARCH
    };
    MEDICAL_ANALYSIS_PROMPT.replace("{research}", research)
}
