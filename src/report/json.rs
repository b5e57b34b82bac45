use error_stack::{Report, ResultExt};

use crate::error::ReportError;
use crate::pipeline::Analysis;
use crate::report::Reporter;

/// Full analysis, rows included, as a JSON document for chart consumers.
pub struct JsonReporter {
    pub pretty: bool,
}

impl Reporter for JsonReporter {
    fn render(&self, analysis: &Analysis) -> Result<String, Report<ReportError>> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(analysis)
        } else {
            serde_json::to_string(analysis)
        };
        rendered
            .change_context(ReportError::Render)
            .attach_with(|| format!("ticker: {}", analysis.ticker))
    }
}
