use chrono_tz::Tz;

use crate::scan_types::*;

/// Where permit requests are submitted once spaces open up.
pub const PERMIT_REQUEST_FORM_URL: &str =
    "https://yosemite.org/yosemite-wilderness-permit-request-form/";

/// Phone number of the wilderness permit office.
pub const PERMIT_OFFICE_PHONE: &str = "209-372-0826";

const NO_SPACES_HEADING: &str = "No permit spaces available";

// Hour not zero-padded. The rendered text is compared byte-for-byte across
// runs, so this format must not drift.
const UPDATED_AT_FORMAT: &str = "%Y-%m-%d %-I:%M:%S %p %Z";

/// Render the scan result as the text block that gets persisted and sent.
///
/// Output depends only on the arguments; rendering the same inputs twice
/// yields byte-identical text, which is what change detection relies on.
pub fn render_report(
    timestamp: ReportTimestamp,
    result: &AvailabilityResult,
    trailheads: &TrailheadDirectory,
    display_tz: Tz,
) -> Result<String, ScanError> {
    let updated = format!(
        "Report last updated {}",
        timestamp.with_timezone(display_tz).format(UPDATED_AT_FORMAT)
    );

    if result.is_empty() {
        return Ok(format!("{NO_SPACES_HEADING}\n\n{updated}\n"));
    }

    let mut blocks = Vec::new();
    for (date, slots) in result.iter() {
        let mut lines = vec![format!("{date}:")];
        for slot in slots {
            let name = &trailheads.require(&slot.trailhead_id)?.name;
            let plural = if slot.available == 1 { "" } else { "s" };
            lines.push(format!("{} permit{} for {}", slot.available, plural, name));
        }
        blocks.push(lines.join("\n"));
    }

    Ok(format!(
        "{}\n\n{updated}\nSubmit a permit request at {PERMIT_REQUEST_FORM_URL}\nPermit office: {PERMIT_OFFICE_PHONE}\n",
        blocks.join("\n\n")
    ))
}
