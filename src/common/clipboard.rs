use arboard::Clipboard;

use crate::common;

/// Reads the clipboard as text, trimmed. Fails with
/// [`common::Error::EmptyClipboard`] if there is nothing there.
pub fn read_url() -> common::Result<String> {
    let mut clipboard = Clipboard::new()?;
    let text = match clipboard.get_text() {
        Ok(text) => text,
        Err(arboard::Error::ContentNotAvailable) => String::new(),
        Err(err) => return Err(Box::new(err)),
    };
    non_empty(&text)
}

fn non_empty(text : &str) -> common::Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Box::new(common::Error::EmptyClipboard));
    }
    Ok(text.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_clipboard_is_an_error() {
        assert!(non_empty("  \n\t").is_err());
        assert_eq!(non_empty(" https://youtu.be/x \n").unwrap(), "https://youtu.be/x");
    }
}
