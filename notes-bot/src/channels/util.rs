//! Shared utilities for channel implementations.

/// Telegram's per-message text limit, in characters.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Split a message into chunks of at most `max_chars` characters.
/// Splits on line boundaries; lines exceeding `max_chars` are hard-split on
/// character boundaries, never inside a code point.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let separator = usize::from(!current.is_empty());

        if current_len + separator + line_len <= max_chars {
            if separator == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += separator + line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            let mut pieces = chars.chunks(max_chars).peekable();
            while let Some(piece) = pieces.next() {
                let piece: String = piece.iter().collect();
                if pieces.peek().is_some() {
                    chunks.push(piece);
                } else {
                    current_len = piece.chars().count();
                    current = piece;
                }
            }
        } else {
            current = line.to_string();
            current_len = line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split an HTML-formatted message (Telegram's HTML subset) into chunks of
/// at most `max_chars` characters that each parse on their own.
///
/// Prefers line boundaries like [`split_message`]. A cut never lands inside a
/// tag or an `&...;` entity, and tags still open at a cut are closed at the
/// end of the chunk and reopened at the start of the next one.
pub fn split_html_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut splitter = HtmlSplitter::new(max_chars);
    for line in text.split_inclusive('\n') {
        splitter.push_line(line);
    }
    splitter.finish()
}

/// Smallest unit the HTML splitter never cuts through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Atom<'a> {
    Open { raw: &'a str, name: &'a str },
    Close { raw: &'a str, name: &'a str },
    Text(&'a str),
}

impl<'a> Atom<'a> {
    fn raw(&self) -> &'a str {
        match *self {
            Atom::Open { raw, .. } | Atom::Close { raw, .. } | Atom::Text(raw) => raw,
        }
    }

    fn len(&self) -> usize {
        self.raw().chars().count()
    }
}

fn tokenize_html(text: &str) -> Vec<Atom<'_>> {
    let mut atoms = Vec::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        let single = c.len_utf8();
        let taken = match c {
            '<' => rest.find('>').map(|end| {
                let raw = &rest[..=end];
                let inner = raw[1..raw.len() - 1].trim_start();
                match inner.strip_prefix('/') {
                    Some(name) => Atom::Close { raw, name: tag_name(name) },
                    None => Atom::Open { raw, name: tag_name(inner) },
                }
            }),
            '&' => rest
                .char_indices()
                .skip(1)
                .take_while(|(_, ch)| ch.is_ascii_alphanumeric() || *ch == '#' || *ch == ';')
                .find(|(_, ch)| *ch == ';')
                .filter(|(end, _)| *end > 1)
                .map(|(end, _)| Atom::Text(&rest[..=end])),
            _ => None,
        };

        let atom = taken.unwrap_or(Atom::Text(&rest[..single]));
        rest = &rest[atom.raw().len()..];
        atoms.push(atom);
    }

    atoms
}

fn tag_name(inner: &str) -> &str {
    let end = inner
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(inner.len());
    &inner[..end]
}

/// Keep `open` in sync with a tag seen in the text.
fn track_tag<'a>(open: &mut Vec<Atom<'a>>, atom: Atom<'a>) {
    match atom {
        Atom::Open { .. } => open.push(atom),
        Atom::Close { name, .. } => {
            let matching = open
                .iter()
                .rposition(|tag| matches!(tag, Atom::Open { name: opened, .. } if *opened == name));
            if let Some(index) = matching {
                open.truncate(index);
            }
        }
        Atom::Text(_) => {}
    }
}

/// Characters needed to close every tag in `open`.
fn closing_len(open: &[Atom<'_>]) -> usize {
    open.iter()
        .map(|tag| match tag {
            Atom::Open { name, .. } => name.chars().count() + 3,
            _ => 0,
        })
        .sum()
}

struct HtmlSplitter<'a> {
    max_chars: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
    /// Byte offset in `current` where this chunk's own content starts,
    /// after any reopened tags
    body_start: usize,
    /// Tags open at the end of `current`, outermost first
    open: Vec<Atom<'a>>,
}

impl<'a> HtmlSplitter<'a> {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
            body_start: 0,
            open: Vec::new(),
        }
    }

    fn has_body(&self) -> bool {
        !self.current[self.body_start..].trim().is_empty()
    }

    /// Whether `atoms` can be appended and the chunk still closed in budget.
    fn fits(&self, atoms: &[Atom<'a>]) -> bool {
        let mut open = self.open.clone();
        let mut len = self.current_len;
        for atom in atoms {
            len += atom.len();
            track_tag(&mut open, *atom);
        }
        len + closing_len(&open) <= self.max_chars
    }

    fn push_line(&mut self, line: &'a str) {
        let atoms = tokenize_html(line);

        if !self.fits(&atoms) && self.has_body() {
            self.flush();
        }
        if self.fits(&atoms) {
            atoms.into_iter().for_each(|atom| self.append(atom));
            return;
        }

        for atom in atoms {
            if !self.fits(&[atom]) && self.has_body() {
                self.flush();
            }
            self.append(atom);
        }
    }

    fn append(&mut self, atom: Atom<'a>) {
        self.current.push_str(atom.raw());
        self.current_len += atom.len();
        track_tag(&mut self.open, atom);
    }

    /// Close the current chunk and start the next one with the open tags.
    fn flush(&mut self) {
        let mut chunk = std::mem::take(&mut self.current);
        for tag in self.open.iter().rev() {
            if let Atom::Open { name, .. } = tag {
                chunk.push_str(&format!("</{}>", name));
            }
        }
        if !chunk[self.body_start..].trim().is_empty() {
            self.chunks.push(chunk);
        }

        for tag in &self.open {
            self.current.push_str(tag.raw());
        }
        self.current_len = self.current.chars().count();
        self.body_start = self.current.len();
    }

    fn finish(mut self) -> Vec<String> {
        if self.has_body() {
            self.flush();
        }
        self.chunks
    }
}
