//! Style catalog: semantic style identifiers to backend cell formats.

use std::collections::BTreeMap;

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, FormatPattern};
use tracing::warn;

use crate::conf::derive_default_style_formats;
use crate::spec::{EnumPredefinedStyle, ExportError, SpecCellFormat, SpecColumnDefinition};
use crate::util::parse_hex_color;

/// Backend formats resolved for one column layout.
#[derive(Debug, Clone)]
pub struct SpecColumnFormatPlan {
    /// Data format per column, in column order.
    pub fmts_by_col: Vec<Format>,
    /// Header row format.
    pub fmt_header: Format,
    /// Group-column format for continuation rows; never the default format,
    /// so the empty cell is always emitted.
    pub fmt_group_continuation: Option<Format>,
}

/// Immutable style lookup shared by every worksheet of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleCatalog {
    dict_fmt: BTreeMap<EnumPredefinedStyle, SpecCellFormat>,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleCatalog {
    /// Catalog with the built-in presets.
    pub fn new() -> Self {
        Self::from_formats(derive_default_style_formats())
    }

    /// Catalog over caller-supplied presets; absent styles fail at resolution.
    pub fn from_formats(dict_fmt: BTreeMap<EnumPredefinedStyle, SpecCellFormat>) -> Self {
        Self { dict_fmt }
    }

    /// Overlay header fill/font colours. Blank or malformed hex values are ignored.
    pub fn with_header_colors(
        mut self,
        bg_color_hex: Option<&str>,
        font_color_hex: Option<&str>,
    ) -> Self {
        let bg_color = derive_valid_color("header_bg_color_hex", bg_color_hex);
        let font_color = derive_valid_color("header_text_color_hex", font_color_hex);
        if bg_color.is_none() && font_color.is_none() {
            return self;
        }

        let fmt_header = self
            .dict_fmt
            .get(&EnumPredefinedStyle::Header)
            .cloned()
            .unwrap_or_default();
        self.dict_fmt.insert(
            EnumPredefinedStyle::Header,
            fmt_header.with_(SpecCellFormat {
                bg_color,
                font_color,
                ..Default::default()
            }),
        );
        self
    }

    /// Look up the format specification of `style`.
    pub fn resolve(&self, style: EnumPredefinedStyle) -> Result<&SpecCellFormat, ExportError> {
        self.dict_fmt
            .get(&style)
            .ok_or_else(|| ExportError::StyleBuild(format!("style {style:?} is not defined")))
    }

    /// Resolve every column's data format and the header format.
    ///
    /// Column style = explicit style override, else the type default; the
    /// column's number format is merged on top.
    pub fn plan_column_formats(
        &self,
        columns: &[SpecColumnDefinition],
    ) -> Result<SpecColumnFormatPlan, ExportError> {
        let mut fmts_by_col = Vec::with_capacity(columns.len());
        let mut fmt_group_continuation = None;
        for column in columns {
            let style = column.style.unwrap_or(column.data_type.default_style());
            let fmt_spec = self.resolve(style)?.with_(SpecCellFormat {
                num_format: column.num_format.clone(),
                ..Default::default()
            });
            if column.if_group && fmt_group_continuation.is_none() {
                fmt_group_continuation =
                    Some(derive_rust_xlsx_format(&derive_continuation_spec(&fmt_spec)));
            }
            fmts_by_col.push(derive_rust_xlsx_format(&fmt_spec));
        }

        let fmt_header = derive_rust_xlsx_format(self.resolve(EnumPredefinedStyle::Header)?);
        Ok(SpecColumnFormatPlan {
            fmts_by_col,
            fmt_header,
            fmt_group_continuation,
        })
    }
}

// Empty cells with the default format are dropped by the backend; a text
// number format keeps the continuation cell in the sheet.
fn derive_continuation_spec(fmt_spec: &SpecCellFormat) -> SpecCellFormat {
    let if_has_num_format = fmt_spec
        .num_format
        .as_deref()
        .is_some_and(|val| !val.is_empty() && !val.eq_ignore_ascii_case("general"));
    if if_has_num_format {
        return fmt_spec.clone();
    }
    fmt_spec.with_(SpecCellFormat {
        num_format: Some("@".to_string()),
        ..Default::default()
    })
}

fn derive_valid_color(option_name: &str, value: Option<&str>) -> Option<String> {
    let c_raw = value?;
    if c_raw.trim().is_empty() {
        return None;
    }
    let color = parse_hex_color(c_raw);
    if color.is_none() {
        warn!(option = option_name, value = c_raw, "ignoring invalid header colour");
    }
    color
}

/// Build a backend format from a format specification.
pub fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format
            .set_pattern(FormatPattern::Solid)
            .set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "justify" => Some(FormatAlign::Justify),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}
