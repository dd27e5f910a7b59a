use nudescan_core::pipeline::PipelineSummary;

pub fn render(summary: &PipelineSummary, report: &str, json: bool) -> anyhow::Result<String> {
    if json {
        let status = if summary.unflushed > 0 { "incomplete" } else { "ok" };
        let value = serde_json::json!({
            "status": status,
            "report": report,
            "summary": summary,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }
    let mut line = format!(
        "discovered {}, queued {}, skipped {} (already reported), recorded {}, flagged {}, failed {}, cancelled {}",
        summary.discovered,
        summary.queued,
        summary.skipped_resumed,
        summary.recorded,
        summary.flagged,
        summary.failed,
        summary.cancelled,
    );
    if summary.archive_errors > 0 {
        line.push_str(&format!(", not archived {}", summary.archive_errors));
    }
    if summary.unflushed > 0 {
        line.push_str(&format!(", NOT SAVED {}", summary.unflushed));
    }
    line.push_str(&format!("; report: {}", report));
    Ok(line)
}
