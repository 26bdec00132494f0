// ==========================================
// 多格式表格合并系统 - xlsx 图片提取
// ==========================================
// 路径: workbook.xml 第一个 sheet → 工作表关系 → drawing 部件
//       → drawing 关系 → xl/media 下的图片字节
// 锚点: twoCellAnchor / oneCellAnchor 的 from(col,row)；absoluteAnchor 无单元格，丢弃
// 失败: 整体降级为"无图片"并记录 warn，不影响数据读取
// ==========================================

use crate::config::ProcessorConfig;
use crate::domain::table::ImageAnchor;
use crate::error::MergeResult;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const EMU_PER_PIXEL: f64 = 9525.0;

/// 关系条目
#[derive(Debug, Clone, PartialEq)]
struct Relationship {
    rel_type: String,
    target: String,
    external: bool,
}

/// 绘图中解析出的原始锚点
#[derive(Debug, Clone, Default, PartialEq)]
struct DrawingAnchor {
    col: Option<usize>,
    row: Option<usize>,
    embed: Option<String>,
    cx: Option<i64>,
    cy: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AnchorField {
    Col,
    Row,
}

pub struct ImageExtractor {
    default_width: u32,
    default_height: u32,
}

impl ImageExtractor {
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            default_width: config.default_image_width,
            default_height: config.default_image_height,
        }
    }

    /// 提取第一个工作表中的图片；任何结构错误都只产生 warn
    pub fn extract(&self, path: &Path) -> Vec<ImageAnchor> {
        match self.try_extract(path) {
            Ok(images) => images,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "图片提取失败，忽略该文件的图片");
                Vec::new()
            }
        }
    }

    fn try_extract(&self, path: &Path) -> MergeResult<Vec<ImageAnchor>> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        let Some(sheet_part) = first_sheet_part(&mut archive)? else {
            return Ok(Vec::new());
        };

        let sheet_rels = read_relationships(&mut archive, &rels_path_for(&sheet_part))?;
        let sheet_dir = dir_of(&sheet_part);
        let mut images = Vec::new();

        for rel in sheet_rels.values() {
            if rel.external || !rel.rel_type.ends_with("/drawing") {
                continue;
            }
            let drawing_part = resolve_part(&sheet_dir, &rel.target);
            let Some(drawing_xml) = read_part_string(&mut archive, &drawing_part)? else {
                tracing::warn!(part = %drawing_part, "绘图部件不存在");
                continue;
            };
            let drawing_rels = read_relationships(&mut archive, &rels_path_for(&drawing_part))?;
            let drawing_dir = dir_of(&drawing_part);

            for anchor in parse_drawing_anchors(&drawing_xml) {
                let Some(embed) = anchor.embed.as_ref() else {
                    continue;
                };
                let (Some(row), Some(col)) = (anchor.row, anchor.col) else {
                    tracing::warn!(embed = %embed, "图片锚点无法定位到单元格，已丢弃");
                    continue;
                };
                let Some(media_rel) = drawing_rels.get(embed).filter(|r| !r.external) else {
                    tracing::warn!(embed = %embed, row, col, "图片关系缺失，已丢弃");
                    continue;
                };
                let media_part = resolve_part(&drawing_dir, &media_rel.target);
                match read_part(&mut archive, &media_part)? {
                    Some(data) if !data.is_empty() => images.push(ImageAnchor {
                        data,
                        row,
                        col,
                        width: emu_to_pixels(anchor.cx).unwrap_or(self.default_width),
                        height: emu_to_pixels(anchor.cy).unwrap_or(self.default_height),
                    }),
                    _ => tracing::warn!(part = %media_part, row, col, "图片数据缺失，已丢弃"),
                }
            }
        }

        tracing::debug!(file = %path.display(), count = images.len(), "图片提取完成");
        Ok(images)
    }
}

// ==========================================
// 包部件读取
// ==========================================

fn read_part(archive: &mut ZipArchive<File>, name: &str) -> MergeResult<Option<Vec<u8>>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn read_part_string(archive: &mut ZipArchive<File>, name: &str) -> MergeResult<Option<String>> {
    Ok(read_part(archive, name)?.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
}

/// 第一个工作表的部件路径
fn first_sheet_part(archive: &mut ZipArchive<File>) -> MergeResult<Option<String>> {
    let Some(workbook_xml) = read_part_string(archive, WORKBOOK_PART)? else {
        return Ok(None);
    };
    let Some(rel_id) = first_sheet_rel_id(&workbook_xml) else {
        return Ok(None);
    };
    let workbook_rels = read_relationships(archive, &rels_path_for(WORKBOOK_PART))?;
    Ok(workbook_rels
        .get(&rel_id)
        .map(|rel| resolve_part(&dir_of(WORKBOOK_PART), &rel.target)))
}

fn read_relationships(
    archive: &mut ZipArchive<File>,
    rels_part: &str,
) -> MergeResult<HashMap<String, Relationship>> {
    Ok(read_part_string(archive, rels_part)?
        .map(|xml| parse_relationships(&xml))
        .unwrap_or_default())
}

// ==========================================
// 路径处理
// ==========================================

/// 部件所在目录（"xl/worksheets/sheet1.xml" → "xl/worksheets"）
fn dir_of(part: &str) -> String {
    part.rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default()
}

/// 部件对应的关系文件路径
fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// 相对 base_dir 解析关系目标（支持 .. 与绝对路径）
fn resolve_part(base_dir: &str, target: &str) -> String {
    let joined = if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else if base_dir.is_empty() {
        target.to_string()
    } else {
        format!("{}/{}", base_dir, target)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn emu_to_pixels(emu: Option<i64>) -> Option<u32> {
    emu.filter(|v| *v > 0)
        .map(|v| (v as f64 / EMU_PER_PIXEL).round() as u32)
        .filter(|px| *px > 0)
}

// ==========================================
// XML 解析
// ==========================================

fn attr_value(e: &BytesStart<'_>, reader: &XmlReader<&[u8]>, local: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(Result::ok)
        .find(|attr| attr.key.local_name().as_ref() == local)
        .and_then(|attr| attr.decode_and_unescape_value(reader).ok())
        .map(|v| v.to_string())
}

fn first_sheet_rel_id(workbook_xml: &str) -> Option<String> {
    let mut reader = XmlReader::from_str(workbook_xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                return attr_value(&e, &reader, b"id");
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "workbook.xml 解析失败");
                return None;
            }
            _ => {}
        }
        buf.clear();
    }
}

fn parse_relationships(xml: &str) -> HashMap<String, Relationship> {
    let mut relationships = HashMap::new();
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"Relationship" => {
                let id = attr_value(&e, &reader, b"Id");
                let target = attr_value(&e, &reader, b"Target");
                if let (Some(id), Some(target)) = (id, target) {
                    let rel_type = attr_value(&e, &reader, b"Type").unwrap_or_default();
                    let external = attr_value(&e, &reader, b"TargetMode")
                        .map(|m| m.eq_ignore_ascii_case("External"))
                        .unwrap_or(false);
                    relationships.insert(
                        id,
                        Relationship {
                            rel_type,
                            target,
                            external,
                        },
                    );
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(error = %e, "关系文件解析失败");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    relationships
}

fn is_anchor(local: &[u8]) -> bool {
    matches!(local, b"twoCellAnchor" | b"oneCellAnchor" | b"absoluteAnchor")
}

fn parse_drawing_anchors(xml: &str) -> Vec<DrawingAnchor> {
    let mut anchors = Vec::new();
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut current: Option<DrawingAnchor> = None;
    let mut in_from = false;
    let mut field: Option<AnchorField> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                local if is_anchor(local) => {
                    current = Some(DrawingAnchor::default());
                    in_from = false;
                }
                b"from" if current.is_some() => in_from = true,
                b"col" if in_from => field = Some(AnchorField::Col),
                b"row" if in_from => field = Some(AnchorField::Row),
                local => {
                    if let Some(anchor) = current.as_mut() {
                        read_picture_attrs(anchor, local, &e, &reader);
                    }
                }
            },
            Ok(Event::Empty(e)) => {
                if let Some(anchor) = current.as_mut() {
                    read_picture_attrs(anchor, e.local_name().as_ref(), &e, &reader);
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(f), Some(anchor)) = (field, current.as_mut()) {
                    let value = t
                        .unescape()
                        .ok()
                        .and_then(|v| v.trim().parse::<usize>().ok());
                    match f {
                        AnchorField::Col => anchor.col = value,
                        AnchorField::Row => anchor.row = value,
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"col" | b"row" => field = None,
                b"from" => in_from = false,
                local if is_anchor(local) => {
                    if let Some(anchor) = current.take() {
                        anchors.push(anchor);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(error = %e, "绘图 XML 解析失败");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    anchors
}

/// blip 的 r:embed 与 ext 的 cx/cy（只取第一次出现）
fn read_picture_attrs(
    anchor: &mut DrawingAnchor,
    local: &[u8],
    e: &BytesStart<'_>,
    reader: &XmlReader<&[u8]>,
) {
    match local {
        b"blip" if anchor.embed.is_none() => anchor.embed = attr_value(e, reader, b"embed"),
        b"ext" if anchor.cx.is_none() => {
            let cx = attr_value(e, reader, b"cx").and_then(|v| v.parse::<i64>().ok());
            let cy = attr_value(e, reader, b"cy").and_then(|v| v.parse::<i64>().ok());
            if cx.is_some() && cy.is_some() {
                anchor.cx = cx;
                anchor.cy = cy;
            }
        }
        _ => {}
    }
}
