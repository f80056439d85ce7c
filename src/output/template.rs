//! Output filename templates.
//!
//! Templates use `{token}` or `{token:spec}` fields where spec follows the
//! familiar `[[fill]align][sign][0][width][.precision][type]` mini-language,
//! e.g. `dark_{exps}s_{gain:03d}g_{temp:02d}C.png`. Braces are escaped by
//! doubling them. Templates are checked when parsed so a bad field is reported
//! before any camera work starts.

use std::fmt;
use std::str::FromStr;

/// Values substituted into a template for one sweep point
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLabel {
    /// Rounded sensor temperature in degrees Celsius
    pub temp: i64,
    pub gain: i64,
    pub exposure_us: u64,
    /// Sanitized camera model
    pub model: String,
    pub stack: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Temp,
    Gain,
    ExpMs,
    ExpS,
    Model,
    Stack,
}

impl Token {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "temp" => Some(Token::Temp),
            "gain" => Some(Token::Gain),
            "expms" => Some(Token::ExpMs),
            "exps" => Some(Token::ExpS),
            "model" => Some(Token::Model),
            "stack" => Some(Token::Stack),
            _ => None,
        }
    }

    fn is_text(self) -> bool {
        self == Token::Model
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    /// Padding goes between the sign and the digits
    AfterSign,
}

impl Align {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(Align::Left),
            '>' => Some(Align::Right),
            '^' => Some(Align::Center),
            '=' => Some(Align::AfterSign),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Sign {
    /// No sign given; only negative numbers are marked
    #[default]
    Negative,
    /// Explicit `-`, same output as the default
    Minus,
    Always,
    Space,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<Align>,
    sign: Sign,
    zero: bool,
    width: usize,
    precision: Option<usize>,
    kind: Option<char>,
}

fn take_number(chars: &[char], i: &mut usize) -> Option<usize> {
    let start = *i;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        *i += 1;
    }
    if *i == start {
        return None;
    }
    chars[start..*i].iter().collect::<String>().parse().ok()
}

impl FormatSpec {
    fn parse(spec: &str) -> Result<Self, String> {
        let chars: Vec<char> = spec.chars().collect();
        let mut parsed = FormatSpec::default();
        let mut i = 0;

        if chars.len() >= 2 && Align::from_char(chars[1]).is_some() {
            parsed.fill = Some(chars[0]);
            parsed.align = Align::from_char(chars[1]);
            i = 2;
        } else if let Some(align) = chars.first().and_then(|&c| Align::from_char(c)) {
            parsed.align = Some(align);
            i = 1;
        }

        match chars.get(i) {
            Some('+') => {
                parsed.sign = Sign::Always;
                i += 1;
            }
            Some('-') => {
                parsed.sign = Sign::Minus;
                i += 1;
            }
            Some(' ') => {
                parsed.sign = Sign::Space;
                i += 1;
            }
            _ => {}
        }

        if chars.get(i) == Some(&'0') {
            parsed.zero = true;
            i += 1;
        }
        parsed.width = take_number(&chars, &mut i).unwrap_or(0);

        if chars.get(i) == Some(&'.') {
            i += 1;
            parsed.precision = Some(
                take_number(&chars, &mut i).ok_or_else(|| format!("missing precision in '{spec}'"))?,
            );
        }

        if let Some(&kind) = chars.get(i) {
            parsed.kind = Some(kind);
            i += 1;
        }

        if i != chars.len() {
            return Err(format!("invalid format specifier '{spec}'"));
        }
        Ok(parsed)
    }

    fn check_for(&self, token: Token, name: &str) -> Result<(), String> {
        if token.is_text() {
            match self.kind {
                None | Some('s') => {}
                Some(kind) => return Err(format!("unknown format code '{kind}' for text field '{name}'")),
            }
            if self.sign != Sign::Negative {
                return Err(format!("sign not allowed for text field '{name}'"));
            }
            if self.align == Some(Align::AfterSign) {
                return Err(format!("'=' alignment not allowed for text field '{name}'"));
            }
        } else {
            match self.kind {
                None | Some('d') => {
                    if self.precision.is_some() {
                        return Err(format!("precision not allowed for integer field '{name}'"));
                    }
                }
                Some('f') => {}
                Some(kind) => return Err(format!("unknown format code '{kind}' for integer field '{name}'")),
            }
        }
        Ok(())
    }

    fn pad(&self, prefix: &str, body: &str, numeric: bool) -> String {
        let fill = self.fill.unwrap_or(if self.zero { '0' } else { ' ' });
        let align = self.align.unwrap_or(match (numeric, self.zero) {
            (true, true) => Align::AfterSign,
            (true, false) => Align::Right,
            (false, _) => Align::Left,
        });

        let len = prefix.chars().count() + body.chars().count();
        if self.width <= len {
            return format!("{prefix}{body}");
        }
        let padding = self.width - len;
        let run = |n: usize| fill.to_string().repeat(n);
        match align {
            Align::Left => format!("{prefix}{body}{}", run(padding)),
            Align::Right => format!("{}{prefix}{body}", run(padding)),
            Align::Center => {
                let left = padding / 2;
                format!("{}{prefix}{body}{}", run(left), run(padding - left))
            }
            Align::AfterSign => format!("{prefix}{}{body}", run(padding)),
        }
    }

    fn format_int(&self, value: i64) -> String {
        let prefix = match (value < 0, self.sign) {
            (true, _) => "-",
            (false, Sign::Always) => "+",
            (false, Sign::Space) => " ",
            (false, Sign::Negative | Sign::Minus) => "",
        };
        let body = match self.kind {
            Some('f') => format!("{:.*}", self.precision.unwrap_or(6), value.unsigned_abs() as f64),
            _ => value.unsigned_abs().to_string(),
        };
        self.pad(prefix, &body, true)
    }

    fn format_text(&self, value: &str) -> String {
        let body: String = match self.precision {
            Some(precision) => value.chars().take(precision).collect(),
            None => value.to_string(),
        };
        self.pad("", &body, false)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(Token, FormatSpec),
}

/// A parsed, validated filename template
#[derive(Debug, Clone, PartialEq)]
pub struct FilenameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    pub fn render(&self, label: &FrameLabel) -> String {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Field(token, spec) => {
                    let value = match token {
                        Token::Temp => spec.format_int(label.temp),
                        Token::Gain => spec.format_int(label.gain),
                        Token::ExpMs => spec.format_int((label.exposure_us / 1_000) as i64),
                        Token::ExpS => spec.format_int((label.exposure_us / 1_000_000) as i64),
                        Token::Stack => spec.format_int(label.stack as i64),
                        Token::Model => spec.format_text(&label.model),
                    };
                    rendered.push_str(&value);
                }
            }
        }
        rendered
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn parse_field(field: &str) -> Result<Segment, String> {
    let (name, spec) = field.split_once(':').unwrap_or((field, ""));
    if name.is_empty() {
        return Err("positional fields '{}' are not supported, name a token".to_string());
    }
    let token = Token::from_name(name).ok_or_else(|| {
        format!("unknown token '{{{name}}}', expected one of temp, gain, expms, exps, model, stack")
    })?;
    let spec = FormatSpec::parse(spec)?;
    spec.check_for(token, name)?;
    Ok(Segment::Field(token, spec))
}

impl FromStr for FilenameTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(format!("nested '{{' in template '{s}'")),
                            Some(c) => field.push(c),
                            None => return Err(format!("unclosed '{{' in template '{s}'")),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_field(&field)?);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(format!("single '}}' in template '{s}'")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(FilenameTemplate {
            source: s.to_string(),
            segments,
        })
    }
}

impl fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(temp: i64, gain: i64, exposure_us: u64) -> FrameLabel {
        FrameLabel {
            temp,
            gain,
            exposure_us,
            model: "zwo_asi120mm_mini".to_string(),
            stack: 3,
        }
    }

    fn render(template: &str, label: &FrameLabel) -> String {
        template.parse::<FilenameTemplate>().unwrap().render(label)
    }

    #[test]
    fn test_default_template() {
        assert_eq!(
            render("dark_{exps}s_{gain:03d}g_{temp:02d}C.png", &label(-12, 120, 5_000_000)),
            "dark_5s_120g_-12C.png"
        );
        assert_eq!(
            render("dark_{exps}s_{gain:03d}g_{temp:02d}C.png", &label(3, 7, 2_500_000)),
            "dark_2s_007g_03C.png"
        );
    }

    #[test]
    fn test_all_tokens() {
        assert_eq!(
            render("{model}/{stack}x_{expms}ms_{gain}_{temp}.tif", &label(-40, 0, 1_500_000)),
            "zwo_asi120mm_mini/3x_1500ms_0_-40.tif"
        );
    }

    #[test]
    fn test_sign_aware_padding() {
        let l = label(-5, 0, 0);
        assert_eq!(render("{temp:03d}", &l), "-05");
        assert_eq!(render("{temp:>4}", &l), "  -5");
        assert_eq!(render("{temp:<4}|", &l), "-5  |");
        assert_eq!(render("{temp:*^6}", &l), "**-5**");
        assert_eq!(render("{gain:+d}", &label(0, 12, 0)), "+12");
        assert_eq!(render("{gain: d}", &label(0, 12, 0)), " 12");
    }

    #[test]
    fn test_explicit_minus_sign_on_numbers() {
        assert_eq!(render("{temp:-03d}", &label(-5, 0, 0)), "-05");
        assert_eq!(render("{gain:-d}", &label(0, 7, 0)), "7");
    }

    #[test]
    fn test_float_and_text_specs() {
        assert_eq!(render("{gain:.2f}", &label(0, 120, 0)), "120.00");
        assert_eq!(render("{temp:06.1f}", &label(-3, 0, 0)), "-003.0");
        assert_eq!(render("{model:.3}", &label(0, 0, 0)), "zwo");
        assert_eq!(render("[{model:>20s}]", &label(0, 0, 0)), "[   zwo_asi120mm_mini]");
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(render("{{gain}}_{gain}", &label(0, 9, 0)), "{gain}_9");
    }

    #[test]
    fn test_invalid_templates_are_rejected() {
        assert!("dark_{unknown}.png".parse::<FilenameTemplate>().is_err());
        assert!("dark_{}.png".parse::<FilenameTemplate>().is_err());
        assert!("dark_{gain.png".parse::<FilenameTemplate>().is_err());
        assert!("dark_}.png".parse::<FilenameTemplate>().is_err());
        assert!("{model:d}".parse::<FilenameTemplate>().is_err());
        assert!("{gain:x}".parse::<FilenameTemplate>().is_err());
        assert!("{gain:.2d}".parse::<FilenameTemplate>().is_err());
        assert!("{model:+}".parse::<FilenameTemplate>().is_err());
        assert!("{model:-}".parse::<FilenameTemplate>().is_err());
        assert!("{gain:03dd}".parse::<FilenameTemplate>().is_err());
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let template: FilenameTemplate = "dark_{exps}s_{gain:03d}g_{temp:02d}C.png".parse().unwrap();
        let l = label(-12, 120, 5_000_000);
        assert_eq!(template.render(&l), template.render(&l));
        assert_eq!(template.to_string(), "dark_{exps}s_{gain:03d}g_{temp:02d}C.png");
    }
}
