//! Pipeline script text inside a job's `config.xml`.
//!
//! Pipeline jobs keep their Groovy source in the first `<script>` element of
//! the job configuration. Only that element's text is read or replaced; the
//! rest of the document is passed through byte for byte.

use crate::ProtoError;

const TAG: &str = "script";

/// Byte span of the first `<script>` element's content.
struct ScriptSpan {
    /// Start of the text, right after the start tag.
    start: usize,
    /// End of the text, right before `</script>`.
    end: usize,
    /// `<script/>` has no end tag.
    self_closing: bool,
    /// Position of the `/>` of a self-closing tag.
    tag_close: usize,
}

fn find_script(xml: &str) -> Result<ScriptSpan, ProtoError> {
    let open = format!("<{TAG}");
    let mut from = 0;
    while let Some(rel) = xml[from..].find(&open) {
        let tag_start = from + rel;
        let after_name = tag_start + open.len();
        let rest = &xml[after_name..];
        match rest.chars().next() {
            Some('>' | '/') => {}
            Some(c) if c.is_whitespace() => {}
            // `<scripts>` or similar
            _ => {
                from = after_name;
                continue;
            }
        }
        let gt = rest
            .find('>')
            .map(|i| after_name + i)
            .ok_or(ProtoError::MissingElement(TAG))?;
        if xml[..gt].ends_with('/') {
            return Ok(ScriptSpan {
                start: gt + 1,
                end: gt + 1,
                self_closing: true,
                tag_close: gt - 1,
            });
        }
        let start = gt + 1;
        let close = format!("</{TAG}>");
        let end = xml[start..]
            .find(&close)
            .map(|i| start + i)
            .ok_or(ProtoError::MissingElement(TAG))?;
        return Ok(ScriptSpan {
            start,
            end,
            self_closing: false,
            tag_close: gt,
        });
    }
    Err(ProtoError::MissingElement(TAG))
}

/// Text of the first `<script>` element, with entities decoded.
///
/// # Errors
///
/// Returns [`ProtoError::MissingElement`] if there is no `<script>` element.
pub fn extract_script(xml: &str) -> Result<String, ProtoError> {
    let span = find_script(xml)?;
    let raw = &xml[span.start..span.end];
    if let Some(cdata) = raw
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
    {
        return Ok(cdata.to_string());
    }
    Ok(unescape(raw))
}

/// Replace the text of the first `<script>` element with `script`.
///
/// # Errors
///
/// Returns [`ProtoError::MissingElement`] if there is no `<script>` element.
pub fn replace_script(xml: &str, script: &str) -> Result<String, ProtoError> {
    let span = find_script(xml)?;
    let escaped = escape(script);
    let mut out = String::with_capacity(xml.len() + escaped.len());
    if span.self_closing {
        out.push_str(&xml[..span.tag_close]);
        out.push('>');
        out.push_str(&escaped);
        out.push_str("</script>");
        out.push_str(&xml[span.start..]);
    } else {
        out.push_str(&xml[..span.start]);
        out.push_str(&escaped);
        out.push_str(&xml[span.end..]);
    }
    Ok(out)
}

/// Escape text for use as XML character data.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Decode the predefined entities and numeric character references.
///
/// Unknown or malformed references are kept verbatim.
#[must_use]
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const CONFIG: &str = r#"<?xml version='1.1' encoding='UTF-8'?>
<flow-definition plugin="workflow-job@2.40">
  <description>demo</description>
  <definition class="org.jenkinsci.plugins.workflow.cps.CpsFlowDefinition" plugin="workflow-cps@2.90">
    <script>node {
  sh &apos;echo &quot;a &lt; b &amp;&amp; c&quot;&apos;
}</script>
    <sandbox>true</sandbox>
  </definition>
</flow-definition>"#;

    #[test]
    fn extracts_decoded_script() {
        let script = extract_script(CONFIG).expect("should find script");
        assert_eq!(script, "node {\n  sh 'echo \"a < b && c\"'\n}");
    }

    #[test]
    fn replace_then_extract_returns_new_text() {
        let new_script = "pipeline { stage('x') { echo \"1 < 2\" } }";
        let xml = replace_script(CONFIG, new_script).expect("should replace");
        assert_eq!(extract_script(&xml).expect("should find"), new_script);
        assert!(xml.contains("<sandbox>true</sandbox>"));
        assert!(xml.starts_with("<?xml version='1.1'"));
        assert!(!xml.contains("node {"));
    }

    #[test]
    fn self_closing_script() {
        let xml = "<definition><script/><sandbox>true</sandbox></definition>";
        assert_eq!(extract_script(xml).expect("should find"), "");
        let replaced = replace_script(xml, "echo 1").expect("should replace");
        assert_eq!(
            replaced,
            "<definition><script>echo 1</script><sandbox>true</sandbox></definition>"
        );
    }

    #[test]
    fn similarly_named_tags_are_skipped() {
        let xml = "<scripts>x</scripts><script>y</script>";
        assert_eq!(extract_script(xml).expect("should find"), "y");
    }

    #[test]
    fn cdata_is_returned_raw() {
        let xml = "<script><![CDATA[a < b & c]]></script>";
        assert_eq!(extract_script(xml).expect("should find"), "a < b & c");
    }

    #[test_case("<project><builders/></project>" ; "absent")]
    #[test_case("<project><script>unterminated" ; "no end tag")]
    fn missing_script(xml: &str) {
        assert!(matches!(
            extract_script(xml),
            Err(ProtoError::MissingElement("script"))
        ));
        assert!(replace_script(xml, "x").is_err());
    }

    #[test_case("&#65;&#x42;", "AB" ; "numeric references")]
    #[test_case("a & b", "a & b" ; "bare ampersand kept")]
    #[test_case("&bogus;", "&bogus;" ; "unknown entity kept")]
    fn unescape_cases(input: &str, expected: &str) {
        assert_eq!(unescape(input), expected);
    }
}
