use vocab_storage::AudioFormat;

/// One piece of text to be spoken.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub format: AudioFormat,
    /// Send the text wrapped in `<speak>` as SSML.
    pub ssml: bool,
}
impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>, format: AudioFormat) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            format,
            ssml: false,
        }
    }

    pub fn with_ssml(mut self, ssml: bool) -> Self {
        self.ssml = ssml;
        self
    }

    /// Text as sent on the wire.
    ///
    /// ```
    /// use vocab_storage::AudioFormat;
    /// use vocab_synth::SynthesisRequest;
    /// let request = SynthesisRequest::new("Salt & pepper", "Joanna", AudioFormat::Mp3).with_ssml(true);
    /// assert_eq!(request.payload(), "<speak>Salt &amp; pepper</speak>");
    /// ```
    pub fn payload(&self) -> String {
        if self.ssml { format!("<speak>{}</speak>", escape_xml(self.text.trim())) } else { self.text.trim().to_string() }
    }

    pub fn text_type(&self) -> &'static str {
        if self.ssml { "ssml" } else { "text" }
    }
}

fn escape_xml(text: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_payload() {
        let request = SynthesisRequest::new("  It's <fine>  ", "Joanna", AudioFormat::Mp3);
        assert_eq!(request.payload(), "It's <fine>");
        assert_eq!(request.text_type(), "text");
    }

    #[test]
    fn test_ssml_payload() {
        let request = SynthesisRequest::new("It's <fine>", "Joanna", AudioFormat::Mp3).with_ssml(true);
        assert_eq!(request.payload(), "<speak>It&apos;s &lt;fine&gt;</speak>");
        assert_eq!(request.text_type(), "ssml");
    }
}
