/// Convert a category name into a lowercase, hyphenated, ASCII slug.
///
/// Latin diacritics are folded (`Política` -> `politica`), every run of other
/// characters becomes a single `-`, and leading/trailing hyphens are dropped.
/// The function is idempotent.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        let mut buf = [0u8; 4];
        let folded = if ch.is_ascii_alphanumeric() {
            Some(&*ch.encode_utf8(&mut buf))
        } else {
            fold_diacritic(ch)
        };
        match folded {
            Some(ascii) => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push_str(ascii);
            }
            None => pending_dash = true,
        }
    }

    slug
}

/// Append `-2`, `-3`, ... until `taken` reports the candidate as free.
pub fn unique_slug(base: &str, mut taken: impl FnMut(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn fold_diacritic(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'œ' => "oe",
        'ß' => "ss",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        _ => return None,
    };
    Some(folded)
}
