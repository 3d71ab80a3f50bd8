//! Typed element shapes read from workbook parts
//!
//! Each shape knows which tags it is built from ([`FromElement::TAGS`]) and
//! how to map a generic [`XmlElement`] subtree into itself. Missing optional
//! attributes become `None`; structural problems become errors.

use super::XmlElement;
use crate::error::{Result, XlsxStreamError};
use crate::types::CellType;

/// Conversion from a generic element subtree into a typed shape
pub trait FromElement: Sized {
    /// Local names of the elements this shape is built from
    const TAGS: &'static [&'static str];

    fn from_element(element: XmlElement) -> Result<Self>;
}

fn parse_u32_attr(element: &XmlElement, name: &str) -> Option<u32> {
    element.attr(name).and_then(|v| v.trim().parse().ok())
}

/// Concatenated text of a rich-text container (`si` or `is`)
///
/// A direct `t` child wins; otherwise the `t` of every `r` run is joined.
/// Phonetic runs (`rPh`) never contribute. Returns `None` when the container
/// has neither form.
fn rich_text(container: &XmlElement) -> Option<String> {
    if let Some(t) = container.child("t") {
        return Some(t.text.clone());
    }
    let mut runs = container.children_named("r").peekable();
    runs.peek()?;
    Some(
        runs.filter_map(|r| r.child("t"))
            .map(|t| t.text.as_str())
            .collect(),
    )
}

/// `<row>` with its cells in document order
#[derive(Debug, Clone, PartialEq)]
pub struct RowElement {
    /// Value of the `r` attribute
    pub number: Option<u32>,
    pub cells: Vec<CellElement>,
}

impl FromElement for RowElement {
    const TAGS: &'static [&'static str] = &["row"];

    fn from_element(element: XmlElement) -> Result<Self> {
        let number = match element.attr("r") {
            Some(r) => Some(r.trim().parse::<u32>().map_err(|_| {
                XlsxStreamError::malformed(0, format!("invalid row number '{}'", r))
            })?),
            None => None,
        };

        let cells = element
            .children
            .into_iter()
            .filter(|c| c.name == "c")
            .map(CellElement::from_element)
            .collect::<Result<Vec<_>>>()?;

        Ok(RowElement { number, cells })
    }
}

/// `<c>` cell element
#[derive(Debug, Clone, PartialEq)]
pub struct CellElement {
    /// Address from the `r` attribute, e.g. `B3`
    pub reference: Option<String>,
    pub cell_type: CellType,
    /// Index into the cellXfs table, 0 when absent
    pub style_index: u32,
    /// Whether the element had any child element at all
    pub has_content: bool,
    /// Text of the `<v>` child
    pub value: Option<String>,
    /// Text of the `<is>` child, for inline strings
    pub inline_text: Option<String>,
}

impl FromElement for CellElement {
    const TAGS: &'static [&'static str] = &["c"];

    fn from_element(element: XmlElement) -> Result<Self> {
        let cell_type = CellType::from_tag(element.attr("t"));
        let style_index = parse_u32_attr(&element, "s").unwrap_or(0);
        let value = element.child("v").map(|v| v.text.clone());
        let inline_text = element.child("is").and_then(rich_text);

        Ok(CellElement {
            reference: element.attr("r").map(str::to_string),
            cell_type,
            style_index,
            has_content: element.has_children(),
            value,
            inline_text,
        })
    }
}

/// `<mergeCell ref="A1:C3"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRangeElement {
    pub reference: String,
}

impl FromElement for MergeRangeElement {
    const TAGS: &'static [&'static str] = &["mergeCell"];

    fn from_element(element: XmlElement) -> Result<Self> {
        let reference = element
            .attr("ref")
            .ok_or_else(|| XlsxStreamError::corrupt("mergeCell without ref attribute"))?
            .to_string();
        Ok(MergeRangeElement { reference })
    }
}

/// Custom number format declaration inside `<numFmts>`
#[derive(Debug, Clone, PartialEq)]
pub struct NumFmt {
    pub id: u32,
    pub code: String,
}

/// Cell format record inside `<cellXfs>`
#[derive(Debug, Clone, PartialEq)]
pub struct CellXf {
    pub num_fmt_id: Option<u32>,
}

/// The two sections of the styles part the decoder needs
#[derive(Debug, Clone, PartialEq)]
pub enum StyleSection {
    NumFmts(Vec<NumFmt>),
    CellXfs(Vec<CellXf>),
}

impl FromElement for StyleSection {
    const TAGS: &'static [&'static str] = &["numFmts", "cellXfs"];

    fn from_element(element: XmlElement) -> Result<Self> {
        if element.name == "numFmts" {
            let formats = element
                .children_named("numFmt")
                .filter_map(|f| {
                    let id = parse_u32_attr(f, "numFmtId")?;
                    let code = f.attr("formatCode")?.to_string();
                    Some(NumFmt { id, code })
                })
                .collect();
            Ok(StyleSection::NumFmts(formats))
        } else {
            let xfs = element
                .children_named("xf")
                .map(|xf| CellXf {
                    num_fmt_id: parse_u32_attr(xf, "numFmtId"),
                })
                .collect();
            Ok(StyleSection::CellXfs(xfs))
        }
    }
}

/// `<sheet>` entry of the workbook part
#[derive(Debug, Clone, PartialEq)]
pub struct SheetElement {
    pub name: String,
    /// Relationship id (`r:id`)
    pub relationship_id: Option<String>,
    /// Visibility state, `hidden` or `veryHidden` when present
    pub state: Option<String>,
}

impl FromElement for SheetElement {
    const TAGS: &'static [&'static str] = &["sheet"];

    fn from_element(element: XmlElement) -> Result<Self> {
        let name = element
            .attr("name")
            .ok_or_else(|| XlsxStreamError::corrupt("sheet entry without name"))?
            .to_string();
        Ok(SheetElement {
            name,
            relationship_id: element.attr("id").map(str::to_string),
            state: element.attr("state").map(str::to_string),
        })
    }
}

/// `<Relationship>` of a relationships part
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipElement {
    pub id: String,
    pub target: String,
    pub external: bool,
}

impl FromElement for RelationshipElement {
    const TAGS: &'static [&'static str] = &["Relationship"];

    fn from_element(element: XmlElement) -> Result<Self> {
        let id = element
            .attr("Id")
            .ok_or_else(|| XlsxStreamError::corrupt("Relationship without Id"))?
            .to_string();
        let target = element
            .attr("Target")
            .ok_or_else(|| XlsxStreamError::corrupt(format!("Relationship '{}' without Target", id)))?
            .to_string();
        let external = element.attr("TargetMode") == Some("External");
        Ok(RelationshipElement {
            id,
            target,
            external,
        })
    }
}

/// `<si>` item of the shared strings part
#[derive(Debug, Clone, PartialEq)]
pub struct SharedStringItem {
    pub text: String,
}

impl FromElement for SharedStringItem {
    const TAGS: &'static [&'static str] = &["si"];

    fn from_element(element: XmlElement) -> Result<Self> {
        let text = rich_text(&element).ok_or_else(|| {
            XlsxStreamError::corrupt("shared string item without text or runs")
        })?;
        Ok(SharedStringItem { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::typed_elements;

    fn parse<T: FromElement>(xml: &str) -> Result<Vec<T>> {
        typed_elements(xml.as_bytes()).collect()
    }

    #[test]
    fn test_row_and_cells() {
        let xml = r#"<sheetData><row r="3" spans="1:3">
            <c r="A3" t="s" s="2"><v>0</v></c>
            <c r="B3" t="inlineStr"><is><t>hi</t></is></c>
            <c r="C3"/>
        </row></sheetData>"#;
        let rows: Vec<RowElement> = parse(xml).unwrap();
        let row = &rows[0];

        assert_eq!(row.number, Some(3));
        assert_eq!(row.cells.len(), 3);
        assert_eq!(row.cells[0].cell_type, CellType::SharedString);
        assert_eq!(row.cells[0].style_index, 2);
        assert_eq!(row.cells[0].value.as_deref(), Some("0"));
        assert_eq!(row.cells[1].inline_text.as_deref(), Some("hi"));
        assert!(!row.cells[2].has_content);
    }

    #[test]
    fn test_invalid_row_number() {
        let result: Result<Vec<RowElement>> = parse(r#"<row r="x"/>"#);
        assert!(matches!(
            result,
            Err(XlsxStreamError::MalformedCell { .. })
        ));
    }

    #[test]
    fn test_rich_text_runs_skip_phonetic() {
        let xml = r#"<sst>
            <si><t>plain</t></si>
            <si><r><t>Bold</t></r><r><t xml:space="preserve"> text</t></r><rPh><t>ignored</t></rPh></si>
            <si><t/></si>
        </sst>"#;
        let items: Vec<SharedStringItem> = parse(xml).unwrap();
        let texts: Vec<_> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["plain", "Bold text", ""]);
    }

    #[test]
    fn test_empty_shared_string_item_is_corrupt() {
        let result: Result<Vec<SharedStringItem>> = parse("<sst><si></si></sst>");
        assert!(matches!(result, Err(XlsxStreamError::CorruptArchive(_))));
    }

    #[test]
    fn test_style_sections() {
        let xml = r#"<styleSheet>
            <numFmts count="1"><numFmt numFmtId="164" formatCode="0.000"/></numFmts>
            <cellStyleXfs><xf numFmtId="99"/></cellStyleXfs>
            <cellXfs><xf numFmtId="0"/><xf numFmtId="164"/><xf/></cellXfs>
        </styleSheet>"#;
        let sections: Vec<StyleSection> = parse(xml).unwrap();

        assert_eq!(
            sections[0],
            StyleSection::NumFmts(vec![NumFmt {
                id: 164,
                code: "0.000".into()
            }])
        );
        assert_eq!(
            sections[1],
            StyleSection::CellXfs(vec![
                CellXf { num_fmt_id: Some(0) },
                CellXf { num_fmt_id: Some(164) },
                CellXf { num_fmt_id: None },
            ])
        );
    }

    #[test]
    fn test_sheets_and_relationships() {
        let sheets: Vec<SheetElement> = parse(
            r#"<workbook xmlns:r="urn:r"><sheets>
                <sheet name="Data" sheetId="1" r:id="rId1"/>
                <sheet name="Secret" sheetId="2" state="hidden" r:id="rId2"/>
            </sheets></workbook>"#,
        )
        .unwrap();
        assert_eq!(sheets[1].state.as_deref(), Some("hidden"));
        assert_eq!(sheets[0].relationship_id.as_deref(), Some("rId1"));

        let rels: Vec<RelationshipElement> = parse(
            r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId9" Target="http://x" TargetMode="External"/></Relationships>"#,
        )
        .unwrap();
        assert_eq!(rels[0].target, "worksheets/sheet1.xml");
        assert!(rels[1].external);
    }
}
