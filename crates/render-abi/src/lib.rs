//! Boundary struct and enum layouts for the rendering engine.
//!
//! Every type the rendering library exchanges with the native
//! measurement/rendering engine is declared here as a compiled
//! [`marshal`] schema with a typed Rust mirror. Field order is layout
//! order and must match the native side bit for bit; any
//! backward-incompatible change must bump [`ABI_VERSION`].

use std::sync::{Arc, OnceLock};

use marshal::{
    EnumSchema, EnumWidth, FieldSpec, FieldType, MarshalError, MarshalResult, Marshaller,
    StructSchema, StructValue, Value,
};

/// Version of the boundary layouts declared in this crate.
pub const ABI_VERSION: u8 = 1;

/// Text attribute bits carried by styled runs and highlight ranges.
pub mod attrs {
    /// Bold weight.
    pub const BOLD: u16 = 1 << 0;
    /// Italic slant.
    pub const ITALIC: u16 = 1 << 1;
    /// Underline decoration.
    pub const UNDERLINE: u16 = 1 << 2;
    /// Faint intensity.
    pub const DIM: u16 = 1 << 3;
    /// Swapped foreground/background.
    pub const INVERSE: u16 = 1 << 4;
    /// Strikethrough decoration.
    pub const STRIKETHROUGH: u16 = 1 << 5;
}

/// Colour depth reported by the native terminal probe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorSupport {
    /// No colour output.
    #[default]
    None,
    /// 16-colour palette.
    Ansi16,
    /// 256-colour palette.
    Ansi256,
    /// 24-bit colour.
    Truecolor,
}

impl ColorSupport {
    fn name(self) -> &'static str {
        match self {
            ColorSupport::None => "none",
            ColorSupport::Ansi16 => "ansi16",
            ColorSupport::Ansi256 => "ansi256",
            ColorSupport::Truecolor => "truecolor",
        }
    }

    fn from_name(name: &str) -> MarshalResult<Self> {
        match name {
            "none" => Ok(ColorSupport::None),
            "ansi16" => Ok(ColorSupport::Ansi16),
            "ansi256" => Ok(ColorSupport::Ansi256),
            "truecolor" => Ok(ColorSupport::Truecolor),
            other => Err(MarshalError::UnknownVariant(other.to_string())),
        }
    }
}

/// Glyph drawn for the cursor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorShape {
    /// Full-cell block.
    #[default]
    Block,
    /// Underline bar.
    Underline,
    /// Vertical bar.
    Bar,
}

impl CursorShape {
    fn name(self) -> &'static str {
        match self {
            CursorShape::Block => "block",
            CursorShape::Underline => "underline",
            CursorShape::Bar => "bar",
        }
    }

    fn from_name(name: &str) -> MarshalResult<Self> {
        match name {
            "block" => Ok(CursorShape::Block),
            "underline" => Ok(CursorShape::Underline),
            "bar" => Ok(CursorShape::Bar),
            other => Err(MarshalError::UnknownVariant(other.to_string())),
        }
    }
}

/// Wire mapping for [`ColorSupport`].
pub fn color_support_schema() -> &'static EnumSchema {
    static CELL: OnceLock<EnumSchema> = OnceLock::new();
    CELL.get_or_init(|| {
        EnumSchema::define(
            &[("none", 0), ("ansi16", 1), ("ansi256", 2), ("truecolor", 3)],
            EnumWidth::U8,
        )
        .expect("colour support mapping is well-formed")
    })
}

/// Wire mapping for [`CursorShape`].
pub fn cursor_shape_schema() -> &'static EnumSchema {
    static CELL: OnceLock<EnumSchema> = OnceLock::new();
    CELL.get_or_init(|| {
        EnumSchema::define(
            &[("block", 0), ("underline", 1), ("bar", 2)],
            EnumWidth::U8,
        )
        .expect("cursor shape mapping is well-formed")
    })
}

/// Layout of the capability struct returned by the native probe.
pub fn term_caps_marshaller() -> &'static Marshaller {
    static CELL: OnceLock<Marshaller> = OnceLock::new();
    CELL.get_or_init(|| {
        Marshaller::new(Arc::new(
            StructSchema::define(vec![
                FieldSpec::new("truecolor", FieldType::U8),
                FieldSpec::new("unicode", FieldType::U8),
                FieldSpec::new("mouse", FieldType::U8),
                FieldSpec::new("kitty_keyboard", FieldType::U8),
                FieldSpec::new("colors", FieldType::U8),
            ])
            .expect("capability layout is well-formed"),
        ))
    })
}

/// Layout of the cursor state struct pushed to the native renderer.
pub fn cursor_state_marshaller() -> &'static Marshaller {
    static CELL: OnceLock<Marshaller> = OnceLock::new();
    CELL.get_or_init(|| {
        Marshaller::new(Arc::new(
            StructSchema::define(vec![
                FieldSpec::new("row", FieldType::U16),
                FieldSpec::new("col", FieldType::U16),
                FieldSpec::new("visible", FieldType::U8).with_default(Value::U8(1)),
                FieldSpec::new("blinking", FieldType::U8).with_default(Value::U8(0)),
                FieldSpec::new("shape", FieldType::U8),
            ])
            .expect("cursor layout is well-formed"),
        ))
    })
}

/// Layout of one styled text run.
///
/// `text` travels inline with its exact byte count mirrored into
/// `text_len`; the optional `link` target packs as a zero-length reference
/// when absent.
pub fn styled_run_marshaller() -> &'static Marshaller {
    static CELL: OnceLock<Marshaller> = OnceLock::new();
    CELL.get_or_init(|| {
        Marshaller::new(Arc::new(
            StructSchema::define(vec![
                FieldSpec::new("fg", FieldType::U32),
                FieldSpec::new("bg", FieldType::U32),
                FieldSpec::new("attrs", FieldType::U16).with_default(Value::U16(0)),
                FieldSpec::new("text_len", FieldType::U32).length_of("text"),
                FieldSpec::new("text", FieldType::Bytes)
                    .with_transform(utf8_pack, |value| utf8_unpack("text", value)),
                FieldSpec::new("link_len", FieldType::U16).length_of("link"),
                FieldSpec::new("link", FieldType::Bytes)
                    .optional()
                    .with_transform(utf8_pack, |value| utf8_unpack("link", value)),
            ])
            .expect("styled run layout is well-formed"),
        ))
    })
}

/// Layout of one highlight range.
pub fn highlight_span_marshaller() -> &'static Marshaller {
    static CELL: OnceLock<Marshaller> = OnceLock::new();
    CELL.get_or_init(|| {
        Marshaller::new(Arc::new(
            StructSchema::define(vec![
                FieldSpec::new("start", FieldType::U32),
                FieldSpec::new("end", FieldType::U32),
                FieldSpec::new("fg", FieldType::U32),
                FieldSpec::new("bg", FieldType::U32),
                FieldSpec::new("attrs", FieldType::U16).with_default(Value::U16(0)),
            ])
            .expect("highlight layout is well-formed"),
        ))
    })
}

/// Layout of a line measurement result.
///
/// The native measurer pads the struct to a word boundary; the padding
/// field is dropped from unpacked values by the reduce hook.
pub fn line_measurement_marshaller() -> &'static Marshaller {
    static CELL: OnceLock<Marshaller> = OnceLock::new();
    CELL.get_or_init(|| {
        Marshaller::new(Arc::new(
            StructSchema::define(vec![
                FieldSpec::new("cols", FieldType::U32),
                FieldSpec::new("rows", FieldType::U32),
                FieldSpec::new("max_line_width", FieldType::U32),
                FieldSpec::new("_pad", FieldType::U16).with_default(Value::U16(0)),
            ])
            .expect("measurement layout is well-formed")
            .with_reduce(|mut value| {
                value.remove("_pad");
                value
            }),
        ))
    })
}

fn utf8_pack(value: Value) -> MarshalResult<Value> {
    match value {
        Value::Str(text) => Ok(Value::Bytes(text.into_bytes())),
        other => Ok(other),
    }
}

fn utf8_unpack(field: &str, value: Value) -> MarshalResult<Value> {
    match value {
        Value::Bytes(bytes) => String::from_utf8(bytes)
            .map(Value::Str)
            .map_err(|_| MarshalError::TypeMismatch {
                field: field.to_string(),
                expected: FieldType::Bytes,
                actual: "non-utf8 bytes",
            }),
        other => Ok(other),
    }
}

fn scalar(value: &StructValue, field: &str) -> MarshalResult<u64> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| MarshalError::MissingField(field.to_string()))
}

fn string(value: &StructValue, field: &str) -> MarshalResult<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MarshalError::MissingField(field.to_string()))
}

/// Terminal capability flags reported by the native probe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TermCaps {
    /// 24-bit colour sequences accepted.
    pub truecolor: bool,
    /// Unicode output (wide glyph measurement) available.
    pub unicode: bool,
    /// Mouse reporting available.
    pub mouse: bool,
    /// Kitty keyboard protocol available.
    pub kitty_keyboard: bool,
    /// Best supported colour depth.
    pub colors: ColorSupport,
}

impl TermCaps {
    /// Packs into the boundary layout.
    pub fn pack(&self) -> MarshalResult<Vec<u8>> {
        let colors = color_support_schema().pack(self.colors.name())?;
        term_caps_marshaller().pack(
            &StructValue::new()
                .with("truecolor", Value::U8(self.truecolor.into()))
                .with("unicode", Value::U8(self.unicode.into()))
                .with("mouse", Value::U8(self.mouse.into()))
                .with("kitty_keyboard", Value::U8(self.kitty_keyboard.into()))
                .with("colors", Value::U8(colors as u8)),
        )
    }

    /// Unpacks from the boundary layout.
    pub fn unpack(raw: &[u8]) -> MarshalResult<Self> {
        let value = term_caps_marshaller().unpack(raw)?;
        let colors = color_support_schema().unpack(scalar(&value, "colors")?)?;
        Ok(Self {
            truecolor: scalar(&value, "truecolor")? != 0,
            unicode: scalar(&value, "unicode")? != 0,
            mouse: scalar(&value, "mouse")? != 0,
            kitty_keyboard: scalar(&value, "kitty_keyboard")? != 0,
            colors: ColorSupport::from_name(colors)?,
        })
    }
}

/// Cursor position and presentation pushed to the native renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorState {
    /// Zero-based row.
    pub row: u16,
    /// Zero-based column.
    pub col: u16,
    /// Whether the cursor is drawn at all.
    pub visible: bool,
    /// Whether the cursor blinks.
    pub blinking: bool,
    /// Cursor glyph.
    pub shape: CursorShape,
}

impl CursorState {
    /// Packs into the boundary layout.
    pub fn pack(&self) -> MarshalResult<Vec<u8>> {
        let shape = cursor_shape_schema().pack(self.shape.name())?;
        cursor_state_marshaller().pack(
            &StructValue::new()
                .with("row", Value::U16(self.row))
                .with("col", Value::U16(self.col))
                .with("visible", Value::U8(self.visible.into()))
                .with("blinking", Value::U8(self.blinking.into()))
                .with("shape", Value::U8(shape as u8)),
        )
    }

    /// Unpacks from the boundary layout.
    pub fn unpack(raw: &[u8]) -> MarshalResult<Self> {
        let value = cursor_state_marshaller().unpack(raw)?;
        let shape = cursor_shape_schema().unpack(scalar(&value, "shape")?)?;
        Ok(Self {
            row: scalar(&value, "row")? as u16,
            col: scalar(&value, "col")? as u16,
            visible: scalar(&value, "visible")? != 0,
            blinking: scalar(&value, "blinking")? != 0,
            shape: CursorShape::from_name(shape)?,
        })
    }
}

/// One styled run of text produced by the fast rendering path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyledRun {
    /// Foreground colour, packed RGBA.
    pub fg: u32,
    /// Background colour, packed RGBA.
    pub bg: u32,
    /// Attribute bits from [`attrs`].
    pub attrs: u16,
    /// Run content.
    pub text: String,
    /// Optional hyperlink target.
    pub link: Option<String>,
}

impl StyledRun {
    /// Packs into the boundary layout.
    pub fn pack(&self) -> MarshalResult<Vec<u8>> {
        let mut value = StructValue::new()
            .with("fg", Value::U32(self.fg))
            .with("bg", Value::U32(self.bg))
            .with("attrs", Value::U16(self.attrs))
            .with("text", Value::Str(self.text.clone()));
        if let Some(link) = &self.link {
            value.set("link", Value::Str(link.clone()));
        }
        styled_run_marshaller().pack(&value)
    }

    /// Unpacks from the boundary layout.
    pub fn unpack(raw: &[u8]) -> MarshalResult<Self> {
        let value = styled_run_marshaller().unpack(raw)?;
        let link = match value.get("link") {
            Some(Value::Str(link)) => Some(link.clone()),
            _ => None,
        };
        Ok(Self {
            fg: scalar(&value, "fg")? as u32,
            bg: scalar(&value, "bg")? as u32,
            attrs: scalar(&value, "attrs")? as u16,
            text: string(&value, "text")?,
            link,
        })
    }
}

/// One highlight range over a buffer region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HighlightSpan {
    /// Inclusive start offset in cells.
    pub start: u32,
    /// Exclusive end offset in cells.
    pub end: u32,
    /// Foreground colour, packed RGBA.
    pub fg: u32,
    /// Background colour, packed RGBA.
    pub bg: u32,
    /// Attribute bits from [`attrs`].
    pub attrs: u16,
}

impl HighlightSpan {
    /// Packs into the boundary layout.
    pub fn pack(&self) -> MarshalResult<Vec<u8>> {
        highlight_span_marshaller().pack(
            &StructValue::new()
                .with("start", Value::U32(self.start))
                .with("end", Value::U32(self.end))
                .with("fg", Value::U32(self.fg))
                .with("bg", Value::U32(self.bg))
                .with("attrs", Value::U16(self.attrs)),
        )
    }

    /// Unpacks from the boundary layout.
    pub fn unpack(raw: &[u8]) -> MarshalResult<Self> {
        let value = highlight_span_marshaller().unpack(raw)?;
        Ok(Self {
            start: scalar(&value, "start")? as u32,
            end: scalar(&value, "end")? as u32,
            fg: scalar(&value, "fg")? as u32,
            bg: scalar(&value, "bg")? as u32,
            attrs: scalar(&value, "attrs")? as u16,
        })
    }
}

/// Measurement result returned by the native width engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineMeasurement {
    /// Columns occupied by the measured text.
    pub cols: u32,
    /// Rows after wrapping.
    pub rows: u32,
    /// Widest wrapped line in columns.
    pub max_line_width: u32,
}

impl LineMeasurement {
    /// Packs into the boundary layout, including the padding word.
    pub fn pack(&self) -> MarshalResult<Vec<u8>> {
        line_measurement_marshaller().pack(
            &StructValue::new()
                .with("cols", Value::U32(self.cols))
                .with("rows", Value::U32(self.rows))
                .with("max_line_width", Value::U32(self.max_line_width)),
        )
    }

    /// Unpacks from the boundary layout; the padding word is dropped.
    pub fn unpack(raw: &[u8]) -> MarshalResult<Self> {
        let value = line_measurement_marshaller().unpack(raw)?;
        Ok(Self {
            cols: scalar(&value, "cols")? as u32,
            rows: scalar(&value, "rows")? as u32,
            max_line_width: scalar(&value, "max_line_width")? as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_roundtrip() {
        let caps = TermCaps {
            truecolor: true,
            unicode: true,
            mouse: false,
            kitty_keyboard: true,
            colors: ColorSupport::Truecolor,
        };
        let raw = caps.pack().expect("pack");
        assert_eq!(raw.len(), 5);
        assert_eq!(TermCaps::unpack(&raw).expect("unpack"), caps);
    }

    #[test]
    fn cursor_defaults_fill_missing_fields() {
        // A bare row/col update relies on the declared defaults.
        let raw = cursor_state_marshaller()
            .pack(
                &StructValue::new()
                    .with("row", Value::U16(12))
                    .with("col", Value::U16(40))
                    .with("shape", Value::U8(0)),
            )
            .expect("pack");
        let state = CursorState::unpack(&raw).expect("unpack");
        assert!(state.visible, "default visible = 1");
        assert!(!state.blinking, "default blinking = 0");
        assert_eq!((state.row, state.col), (12, 40));
    }

    #[test]
    fn styled_run_roundtrip_with_link() {
        let run = StyledRun {
            fg: 0xFFCC_0000,
            bg: 0x0000_00FF,
            attrs: attrs::BOLD | attrs::UNDERLINE,
            text: "naïve café".to_string(),
            link: Some("https://example.com".to_string()),
        };
        let raw = run.pack().expect("pack");
        assert_eq!(StyledRun::unpack(&raw).expect("unpack"), run);
    }

    #[test]
    fn styled_run_absent_link_stays_absent() {
        let run = StyledRun {
            fg: 1,
            bg: 2,
            attrs: 0,
            text: "plain".to_string(),
            link: None,
        };
        let raw = run.pack().expect("pack");
        let back = StyledRun::unpack(&raw).expect("unpack");
        assert_eq!(back.link, None);
        assert_eq!(back.text, "plain");
    }

    #[test]
    fn measurement_drops_padding() {
        let measurement = LineMeasurement {
            cols: 120,
            rows: 3,
            max_line_width: 80,
        };
        let raw = measurement.pack().expect("pack");
        // cols + rows + max_line_width + padding word.
        assert_eq!(raw.len(), 14);
        let value = line_measurement_marshaller().unpack(&raw).expect("unpack");
        assert!(value.get("_pad").is_none(), "reduce removes the padding");
        assert_eq!(LineMeasurement::unpack(&raw).expect("unpack"), measurement);
    }

    #[test]
    fn cursor_shape_codes_are_total() {
        let schema = cursor_shape_schema();
        assert_eq!(schema.pack("bar").unwrap(), 2);
        assert_eq!(schema.unpack(1).unwrap(), "underline");
        assert!(matches!(
            schema.unpack(9),
            Err(MarshalError::UnknownCode(9))
        ));
    }

    #[test]
    fn truncated_highlight_is_rejected() {
        let raw = HighlightSpan {
            start: 0,
            end: 10,
            fg: 0,
            bg: 0,
            attrs: 0,
        }
        .pack()
        .expect("pack");
        assert!(matches!(
            HighlightSpan::unpack(&raw[..raw.len() - 1]),
            Err(MarshalError::TruncatedInput { .. })
        ));
    }
}
