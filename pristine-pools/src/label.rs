//! Process identity label.

use std::path::Path;

/// Derive a label identifying the running program.
///
/// Used in external resource names, so that resources created by different test binaries
/// sharing a host do not collide. Returns an empty string if no usable name is found.
#[must_use]
pub fn process_label() -> String {
    std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|name| label_from_binary_name(&name.to_string_lossy()))
        })
        .unwrap_or_default()
}

/// Strip test harness decorations from binary file name.
///
/// Cargo names test binaries `<crate>-<16 hex digits>`, other toolchains use `<pkg>.test`.
fn label_from_binary_name(name: &str) -> String {
    let name = name.strip_suffix(".exe").unwrap_or(name);
    let name = name.strip_suffix(".test").unwrap_or(name);
    match name.rsplit_once('-') {
        Some((stem, hash))
            if !stem.is_empty()
                && hash.len() == 16
                && hash.bytes().all(|b| b.is_ascii_hexdigit()) =>
        {
            stem.into()
        }
        _ => name.into(),
    }
}
