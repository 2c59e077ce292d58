//! Output file naming.

use chrono::NaiveDateTime;

use feedback_core::defaults::STEM_TIMESTAMP_FORMAT;
use feedback_core::DistroInfo;

/// Build the file-name stem correlating collector output with a request:
/// `prefix-<distro>-<release>-<category>-<YYYYMMDD-HHMMSS>`.
///
/// The stem is not unique: two requests for the same category within one
/// second share it. Path separators inside components are replaced with `_`
/// so the stem always names an entry directly inside the output directory.
pub fn output_stem(prefix: &str, distro: &DistroInfo, category: &str, at: NaiveDateTime) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        file_component(prefix),
        file_component(&distro.distro_name),
        file_component(&distro.distro_release),
        file_component(category),
        at.format(STEM_TIMESTAMP_FORMAT)
    )
}

fn file_component(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
