//! Cleanup of the strings printers put in their MIB tables.

/// Decode an OCTET STRING into display text.
///
/// Trailing NULs and whitespace are dropped. Hex dumps (`"54 6F 6E 65 72"`,
/// `"54:6F:6E"`, `"0x546F6E"`) are decoded when they hold printable text.
/// Bytes that are not UTF-8 are read as Latin-1.
pub fn decode_text(raw: &[u8]) -> String {
    let text = bytes_to_text(raw);
    match decode_hex_dump(&text) {
        Some(decoded) => decoded,
        None => text,
    }
}

fn bytes_to_text(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != 0 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    let raw = &raw[..end];

    match std::str::from_utf8(raw) {
        Ok(text) => text.trim().to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect::<String>().trim().to_string(),
    }
}

fn decode_hex_dump(text: &str) -> Option<String> {
    let digits: String = if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        rest.to_string()
    } else {
        let pairs: Vec<&str> = text.split([' ', ':']).filter(|t| !t.is_empty()).collect();
        if pairs.len() < 2 || pairs.iter().any(|p| p.len() != 2) {
            return None;
        }
        pairs.concat()
    };

    let bytes = hex::decode(digits).ok()?;
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let decoded = std::str::from_utf8(&bytes[..end]).ok()?.trim();
    let printable = !decoded.is_empty() && decoded.chars().all(|c| !c.is_control());
    printable.then(|| decoded.to_string())
}

/// Split camel-case words and title-case the result.
///
/// `"blackTonerCartridge"` becomes `"Black Toner Cartridge"`; a capital only
/// starts a new word when it follows a lowercase letter, so `"HP"` stays one
/// word (and title-cases to `"Hp"`).
pub fn normalize_name(raw: &str) -> String {
    let mut spaced = String::with_capacity(raw.len() + 8);
    let mut previous: Option<char> = None;

    for c in raw.chars() {
        if c.is_uppercase() && previous.is_some_and(char::is_lowercase) {
            spaced.push(' ');
        }
        spaced.push(c);
        previous = Some(c);
    }

    spaced
        .split_whitespace()
        .map(title_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
