use super::*;

#[test]
fn empty_text_has_no_chunks() {
    assert!(split_into_chunks("", 500).is_empty());
    assert!(ChunkingConfig::default().split("").is_empty());
}

#[test]
fn short_text_is_one_chunk() {
    assert_eq!(split_into_chunks("hello", 500), vec!["hello"]);
}

#[test]
fn exact_multiple_has_no_trailing_chunk() {
    let text = "abcdef";
    assert_eq!(split_into_chunks(text, 3), vec!["abc", "def"]);
    assert_eq!(split_into_chunks(text, 6), vec!["abcdef"]);
}

#[test]
fn concatenation_reproduces_text() {
    let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(40);
    for chunk_size in [1, 7, 64, 500, 1024] {
        let chunks = split_into_chunks(&text, chunk_size);
        assert_eq!(chunks.concat(), text);

        let (last, rest) = chunks.split_last().expect("text is non-empty");
        assert!(rest.iter().all(|c| c.chars().count() == chunk_size));
        assert!((1..=chunk_size).contains(&last.chars().count()));
    }
}

#[test]
fn counts_characters_not_bytes() {
    // Each of these is several bytes long in UTF-8
    let text = "日本語のテキスト🙂🙂";
    let chunks = split_into_chunks(text, 4);
    assert_eq!(chunks, vec!["日本語の", "テキスト", "🙂🙂"]);
}

#[test]
fn default_width_matches_field_cap() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 500);

    let text = "x".repeat(1201);
    let chunks = config.split(&text);
    assert_eq!(
        chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
        vec![500, 500, 201]
    );
    assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_SIZE));
}

#[test]
fn zero_width_behaves_as_one() {
    assert_eq!(split_into_chunks("abc", 0), vec!["a", "b", "c"]);
}
