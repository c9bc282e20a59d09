//! Auto-submitting POST form extraction.
//!
//! A streaming tag scanner, not an HTML parser: it walks start and end tags,
//! skips comments and `<script>`/`<style>` bodies, and records each POST
//! form's action together with the hidden inputs that appear before it closes.
//! Opening a new form ends the previous one, so sibling forms never share
//! fields.

/// A POST form found in a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostForm {
    action: String,
    fields: Vec<(String, String)>,
}

impl PostForm {
    /// The last POST form in `html`, if any.
    #[must_use]
    pub fn extract(html: &str) -> Option<Self> {
        scan(html).pop()
    }

    /// The first POST form in `html` carrying a hidden input named `field`.
    #[must_use]
    pub fn extract_with_field(html: &str, field: &str) -> Option<Self> {
        scan(html).into_iter().find(|form| form.field(field).is_some())
    }

    /// The form's `action` attribute, entity-decoded, possibly relative.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Hidden fields in document order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Value of the hidden field `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_field(&mut self, name: String, value: String) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((name, value)),
        }
    }
}

/// Collect every POST form in document order.
fn scan(html: &str) -> Vec<PostForm> {
    let mut forms = Vec::new();
    let mut open: Option<PostForm> = None;

    for tag in Tags::new(html) {
        match (tag.name.as_str(), tag.closing) {
            ("form", false) => {
                forms.extend(open.take());
                if tag.attr("method").is_some_and(|m| m.eq_ignore_ascii_case("post")) {
                    open = Some(PostForm {
                        action: tag.attr("action").unwrap_or_default().to_string(),
                        fields: Vec::new(),
                    });
                }
            }
            ("form", true) => forms.extend(open.take()),
            ("input", false) => {
                let Some(form) = open.as_mut() else { continue };
                let hidden = tag.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden"));
                match tag.attr("name") {
                    Some(name) if hidden && !name.is_empty() => {
                        let value = tag.attr("value").unwrap_or_default().to_string();
                        form.set_field(name.to_string(), value);
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    forms.extend(open);
    forms
}

#[derive(Debug)]
struct Tag {
    name: String,
    closing: bool,
    attrs: Vec<(String, String)>,
}

impl Tag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Iterator over the tags of a document.
///
/// Works on bytes; every delimiter it looks for is ASCII, so slicing at those
/// positions always lands on a char boundary.
struct Tags<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tags<'a> {
    const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn skip_past(&mut self, needle: &str) {
        self.pos = self.src[self.pos..]
            .find(needle)
            .map_or(self.src.len(), |i| self.pos + i + needle.len());
    }

    fn skip_raw_text(&mut self, name: &str) {
        let closing = format!("</{name}");
        let rest = self.src[self.pos..].to_ascii_lowercase();
        self.pos = rest
            .find(&closing)
            .map_or(self.src.len(), |i| self.pos + i);
    }
}

impl Iterator for Tags<'_> {
    type Item = Tag;

    fn next(&mut self) -> Option<Tag> {
        let bytes = self.src.as_bytes();

        loop {
            let start = self.pos + self.src[self.pos..].find('<')?;
            let rest = &self.src[start..];

            if rest.starts_with("<!--") {
                self.pos = start;
                self.skip_past("-->");
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos = start;
                self.skip_past(">");
                continue;
            }

            let closing = rest.as_bytes().get(1) == Some(&b'/');
            let name_start = start + if closing { 2 } else { 1 };
            let mut i = name_start;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
                i += 1;
            }
            if i == name_start {
                self.pos = start + 1;
                continue;
            }
            let name = self.src[name_start..i].to_ascii_lowercase();

            let (attrs, end) = parse_attributes(self.src, i);
            self.pos = end;

            if !closing && (name == "script" || name == "style") {
                self.skip_raw_text(&name);
            }

            return Some(Tag {
                name,
                closing,
                attrs,
            });
        }
    }
}

/// Parse attributes from `pos` up to the closing `>`.
///
/// Returns the attributes and the position just past the tag.
fn parse_attributes(src: &str, mut pos: usize) -> (Vec<(String, String)>, usize) {
    let bytes = src.as_bytes();
    let mut attrs = Vec::new();

    loop {
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b'/') {
            pos += 1;
        }
        if pos >= bytes.len() {
            return (attrs, pos);
        }
        if bytes[pos] == b'>' {
            return (attrs, pos + 1);
        }

        let name_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/')
        {
            pos += 1;
        }
        if pos == name_start {
            // Stray '='.
            pos += 1;
            continue;
        }
        let name = src[name_start..pos].to_ascii_lowercase();

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let mut value = "";
        if pos < bytes.len() && bytes[pos] == b'=' {
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos < bytes.len() && (bytes[pos] == b'"' || bytes[pos] == b'\'') {
                let quote = bytes[pos];
                let value_start = pos + 1;
                let value_end = bytes[value_start..]
                    .iter()
                    .position(|&b| b == quote)
                    .map_or(bytes.len(), |i| value_start + i);
                value = &src[value_start..value_end];
                pos = (value_end + 1).min(bytes.len());
            } else {
                let value_start = pos;
                while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>'
                {
                    pos += 1;
                }
                value = &src[value_start..pos];
            }
        }

        attrs.push((name, decode_entities(value)));
    }
}

/// Decode the character references that appear in attribute values.
fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
