use serde::Serialize;

use crate::error::SessionError;

/// One addressable slice of a message.
///
/// `start` and `end` are inclusive character offsets into the original
/// message (range addressing); `ordinal` is the slice's position in the
/// chunk list (index addressing). Offsets count Unicode scalar values, so a
/// chunk never splits a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub ordinal: usize,
    pub start: usize,
    pub end: usize,
    pub payload: String,
}

impl Chunk {
    /// Number of characters carried.
    pub fn char_len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Split `message` into contiguous chunks of at most `chunk_size` characters.
///
/// An empty message yields no chunks.
pub fn chunk(message: &str, chunk_size: usize) -> Result<Vec<Chunk>, SessionError> {
    if chunk_size == 0 {
        return Err(SessionError::InvalidChunkSize);
    }

    let chars: Vec<char> = message.chars().collect();
    let chunks = chars
        .chunks(chunk_size)
        .enumerate()
        .map(|(ordinal, piece)| {
            let start = ordinal * chunk_size;
            Chunk {
                ordinal,
                start,
                end: start + piece.len() - 1,
                payload: piece.iter().collect(),
            }
        })
        .collect();
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_world_at_five() {
        let chunks = chunk("Hello, world!", 5).unwrap();
        let payloads: Vec<&str> = chunks.iter().map(|c| c.payload.as_str()).collect();
        assert_eq!(payloads, vec!["Hello", ", wor", "ld!"]);
        assert_eq!((chunks[2].start, chunks[2].end), (10, 12));
        assert_eq!(chunks[2].ordinal, 2);
        assert_eq!(chunks[2].char_len(), 3);
    }

    #[test]
    fn test_exact_multiple() {
        let chunks = chunk("abcdef", 3).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].end, 5);
    }

    #[test]
    fn test_multibyte_is_not_split() {
        let chunks = chunk("añb€c", 2).unwrap();
        let payloads: Vec<&str> = chunks.iter().map(|c| c.payload.as_str()).collect();
        assert_eq!(payloads, vec!["añ", "b€", "c"]);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert_eq!(chunk("abc", 0), Err(SessionError::InvalidChunkSize));
    }

    #[test]
    fn test_empty_message_has_no_chunks() {
        assert!(chunk("", 4).unwrap().is_empty());
    }

    #[test]
    fn test_chunks_cover_message() {
        let msg = "The quick brown fox jumps over the lazy dog";
        for size in 1..=msg.len() + 1 {
            let joined: String = chunk(msg, size).unwrap().into_iter().map(|c| c.payload).collect();
            assert_eq!(joined, msg);
        }
    }
}
