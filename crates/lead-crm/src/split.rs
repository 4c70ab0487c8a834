/// Maximum chunk length the CRM accepts per `send_message` call.
pub const MAX_CHUNK_LEN: usize = 300;

/// Split `body` into chunks of at most [`MAX_CHUNK_LEN`] characters,
/// preferring sentence boundaries (`. `, `! `, `? `, `\n`) over mid-word
/// cuts. Grounded on `ghl_client.py::_split_message`.
pub fn split_message(body: &str) -> Vec<String> {
    if body.chars().count() <= MAX_CHUNK_LEN {
        return vec![body.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = body;

    while remaining.chars().count() > MAX_CHUNK_LEN {
        let boundary = best_split_point(remaining);
        let (head, tail) = remaining.split_at(boundary);
        chunks.push(head.trim_end().to_string());
        remaining = tail.trim_start();
    }

    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }

    chunks
}

/// Find a byte index <= MAX_CHUNK_LEN chars in, at the latest sentence or
/// word boundary available; falls back to a hard cut at the char limit.
fn best_split_point(text: &str) -> usize {
    let limit_byte = char_boundary_at(text, MAX_CHUNK_LEN);
    let window = &text[..limit_byte];

    for sep in [". ", "! ", "? ", "\n"] {
        if let Some(idx) = window.rfind(sep) {
            return idx + sep.len();
        }
    }

    if let Some(idx) = window.rfind(' ') {
        return idx + 1;
    }

    limit_byte
}

fn char_boundary_at(text: &str, max_chars: usize) -> usize {
    text.char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_single_chunk() {
        assert_eq!(split_message("hola"), vec!["hola".to_string()]);
    }

    #[test]
    fn long_message_splits_on_sentence_boundary() {
        let sentence = "Gracias por tu mensaje. ".repeat(20);
        let chunks = split_message(&sentence);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= MAX_CHUNK_LEN);
        }
    }

    #[test]
    fn rejoined_chunks_preserve_content_words() {
        let sentence = "a ".repeat(400);
        let chunks = split_message(&sentence);
        let rejoined: String = chunks.join(" ");
        assert_eq!(
            rejoined.split_whitespace().count(),
            sentence.split_whitespace().count()
        );
    }
}
