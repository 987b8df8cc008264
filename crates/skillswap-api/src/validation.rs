//! Input validation. Every check returns `Error::Validation` with a message
//! the client can show directly; nothing here is ever fatal.

use skillswap_types::{Error, Result};

/// Upload ceiling for shared files and chat attachments.
pub const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "rtf", "odt", "xls", "xlsx", "csv", "ppt", "pptx", "jpg",
    "jpeg", "png", "gif", "webp", "svg", "mp4", "webm", "mp3", "wav", "zip",
];

pub fn validate_email(email: &str) -> Result<()> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(Error::validation("Invalid email format"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(Error::validation("Invalid email format"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(Error::validation("Password must be at least 8 characters"));
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<()> {
    validate_text_length(name, 2, 50, "Name")
}

pub fn validate_community_name(name: &str) -> Result<()> {
    validate_text_length(name, 3, 50, "Community name")
}

pub fn validate_event_title(title: &str) -> Result<()> {
    validate_text_length(title, 3, 100, "Event title")
}

/// Descriptions are optional, but capped when present.
pub fn validate_description(description: &str, max_len: usize) -> Result<()> {
    if description.trim().is_empty() {
        return Ok(());
    }
    if description.chars().count() > max_len {
        return Err(Error::validation(format!(
            "Description must be less than {max_len} characters"
        )));
    }
    Ok(())
}

pub fn validate_text_length(text: &str, min: usize, max: usize, field: &str) -> Result<()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    let len = trimmed.chars().count();
    if len < min {
        return Err(Error::validation(format!(
            "{field} must be at least {min} characters"
        )));
    }
    if len > max {
        return Err(Error::validation(format!(
            "{field} must be less than {max} characters"
        )));
    }
    Ok(())
}

pub fn validate_future_date(
    date: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
    field: &str,
) -> Result<()> {
    if date <= now {
        return Err(Error::validation(format!("{field} must be in the future")));
    }
    Ok(())
}

pub fn validate_participant_limit(limit: Option<u32>) -> Result<()> {
    if let Some(limit) = limit {
        if !(2..=1000).contains(&limit) {
            return Err(Error::validation(
                "Participant limit must be between 2 and 1000",
            ));
        }
    }
    Ok(())
}

pub fn validate_file_size(size: usize) -> Result<()> {
    if size > MAX_FILE_SIZE {
        return Err(Error::validation(format!(
            "File size must be less than {}MB",
            MAX_FILE_SIZE / (1024 * 1024)
        )));
    }
    Ok(())
}

pub fn validate_file_type(file_name: &str) -> Result<()> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(Error::validation(format!(
            "File type .{extension} is not allowed"
        )));
    }
    Ok(())
}

/// Trim and strip anything that looks like markup. Text is stored plain.
pub fn sanitize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.trim().chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_checks() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("alice@nodot").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }

    #[test]
    fn text_length_bounds() {
        assert!(validate_display_name("Jo").is_ok());
        assert!(validate_display_name("J").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_event_title(&"x".repeat(101)).is_err());
        assert!(validate_community_name("Math Circle").is_ok());
    }

    #[test]
    fn file_checks() {
        assert!(validate_file_type("notes.pdf").is_ok());
        assert!(validate_file_type("notes.PDF").is_ok());
        assert!(validate_file_type("script.exe").is_err());
        assert!(validate_file_type("noextension").is_err());
        assert!(validate_file_size(MAX_FILE_SIZE).is_ok());
        assert!(validate_file_size(MAX_FILE_SIZE + 1).is_err());
    }

    #[test]
    fn sanitizer_strips_markup() {
        assert_eq!(sanitize_text("  hello  "), "hello");
        assert_eq!(sanitize_text("a <b>bold</b> move"), "a bold move");
        assert_eq!(sanitize_text("<script>alert(1)</script>hi"), "alert(1)hi");
    }
}
