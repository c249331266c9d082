//! Output filename convention.
//!
//! Every processed image is named after its source: the last extension is
//! dropped and `_processed.<ext>` is appended, where `<ext>` follows the
//! output format:
//!
//! - `dawn.png` → `dawn_processed.webp`
//! - `IMG.1234.JPG` → `IMG.1234_processed.jpg`
//! - `README` → `README_processed.webp`
//!
//! Only the final extension is stripped. Names are not deduplicated; two
//! sources called `a.png` and `a.jpg` both become `a_processed.webp`.

use crate::imaging::OutputFormat;

/// Suffix inserted between the stem and the new extension.
pub const PROCESSED_SUFFIX: &str = "_processed";

/// Strip the final `.ext` from a filename.
///
/// A dot that starts the name (`.hidden`) or a trailing dot with nothing
/// after it does not count as an extension separator. This differs from a
/// plain "last dot" rule, which would turn `.hidden` into an empty stem and
/// name the output `_processed.webp`.
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) => filename,
        Some(pos) if pos + 1 < filename.len() && !filename[pos + 1..].contains('/') => {
            &filename[..pos]
        }
        _ => filename,
    }
}

/// Build the output filename for `source_name` encoded as `format`.
pub fn output_filename(source_name: &str, format: OutputFormat) -> String {
    format!(
        "{}{}.{}",
        strip_extension(source_name),
        PROCESSED_SUFFIX,
        format.extension()
    )
}
