//! File and folder names for downloaded galleries.

/// Strip characters that cannot appear in a file name on this platform.
pub fn fix_filename(name: &str) -> String {
    fix_filename_for(name, cfg!(windows))
}

/// Same as [`fix_filename`] with the platform chosen explicitly. Reserved
/// characters are swapped for look-alikes so titles stay readable.
pub fn fix_filename_for(name: &str, windows: bool) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '\n' | '\r' | '\t' => {}
            '/' => out.push('⁄'),
            '?' if windows => out.push('？'),
            '\\' if windows => out.push('⧹'),
            ':' if windows => out.push('꞉'),
            '*' if windows => out.push('＊'),
            '"' if windows => out.push('＂'),
            '<' if windows => out.push('＜'),
            '>' if windows => out.push('＞'),
            '|' if windows => out.push('｜'),
            c => out.push(c),
        }
    }
    out
}

/// Collapse a list of names for a folder title: one or two are kept,
/// more become "Various".
pub fn many_to_one(names: &[String]) -> Option<String> {
    let fixed: Vec<String> = names.iter().map(|n| fix_filename(n)).collect();
    match fixed.len() {
        0 => None,
        1 | 2 => Some(fixed.join(", ")),
        _ => Some("Various".to_string()),
    }
}

/// `[{artists}] {title} (FAKKU)`, or `{title} (FAKKU)` with no artist.
pub fn folder_title(artists: &[String], title: &str) -> String {
    let title = fix_filename(title);
    match many_to_one(artists) {
        Some(artist) => format!("[{}] {} (FAKKU)", artist, title),
        None => format!("{} (FAKKU)", title),
    }
}

/// Zero-padding width for page numbers: at least two digits.
pub fn page_padding(total_pages: usize) -> usize {
    total_pages.to_string().len().max(2)
}

pub fn page_file_name(num: u32, padding: usize, ext: &str) -> String {
    format!("{:0width$}.{}", num, ext, width = padding)
}

/// Composite spread image, named after both page stems.
pub fn spread_file_name(left_stem: &str, right_stem: &str) -> String {
    format!("{}-{}a.png", left_stem, right_stem)
}

/// Left page after it was used in a spread.
pub fn spread_left_name(stem: &str, ext: &str) -> String {
    format!("{}b.{}", stem, ext)
}

/// Right page after it was used in a spread.
pub fn spread_right_name(stem: &str, ext: &str) -> String {
    format!("{}c.{}", stem, ext)
}
