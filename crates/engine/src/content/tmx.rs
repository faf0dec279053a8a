use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use thiserror::Error;

use crate::app::{strip_gid_flags, Rect, TileLayer, TileMap, TilemapError, Tileset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum TmxError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed XML in {path} at {location}: {source}")]
    Xml {
        path: PathBuf,
        location: SourceLocation,
        #[source]
        source: roxmltree::Error,
    },
    #[error("root element of {path} must be <{expected}>, found <{found}>")]
    InvalidRoot {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },
    #[error("<{element}> is missing attribute '{attribute}' ({path}:{location})")]
    MissingAttribute {
        path: PathBuf,
        element: String,
        attribute: &'static str,
        location: SourceLocation,
    },
    #[error("<{element}> attribute '{attribute}' has invalid value '{value}' ({path}:{location})")]
    InvalidAttribute {
        path: PathBuf,
        element: String,
        attribute: &'static str,
        value: String,
        location: SourceLocation,
    },
    #[error("unsupported map orientation '{orientation}' in {path}; only orthogonal maps load")]
    UnsupportedOrientation { path: PathBuf, orientation: String },
    #[error("infinite maps are not supported ({path})")]
    InfiniteMap { path: PathBuf },
    #[error("layer '{layer}' uses unsupported encoding '{encoding}' ({path}); save the map as CSV")]
    UnsupportedEncoding {
        path: PathBuf,
        layer: String,
        encoding: String,
    },
    #[error("layer '{layer}' uses unsupported compression '{compression}' ({path})")]
    UnsupportedCompression {
        path: PathBuf,
        layer: String,
        compression: String,
    },
    #[error("layer '{layer}' has invalid tile gid '{value}' ({path}:{location})")]
    InvalidGid {
        path: PathBuf,
        layer: String,
        value: String,
        location: SourceLocation,
    },
    #[error("tileset '{name}' has no <image> ({path})")]
    MissingTilesetImage { path: PathBuf, name: String },
    #[error("invalid map in {path}: {source}")]
    Tilemap {
        path: PathBuf,
        #[source]
        source: TilemapError,
    },
}

/// Everything the game needs from a map file: drawable tile layers and the
/// obstacle rectangles from its object groups.
#[derive(Debug, Clone, PartialEq)]
pub struct MapData {
    pub tilemap: TileMap,
    pub obstacles: Vec<Rect>,
}

pub fn load_tmx(path: &Path) -> Result<MapData, TmxError> {
    let raw = read_file(path)?;
    parse_tmx(&raw, path)
}

/// Parses TMX text. `path` is used for error messages and to resolve
/// external tilesets and tileset images relative to the map.
pub fn parse_tmx(raw: &str, path: &Path) -> Result<MapData, TmxError> {
    let doc = parse_document(raw, path)?;
    let ctx = ParseContext { path, doc: &doc };
    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(TmxError::InvalidRoot {
            path: path.to_path_buf(),
            expected: "map",
            found: root.tag_name().name().to_string(),
        });
    }

    let orientation = root.attribute("orientation").unwrap_or("orthogonal");
    if orientation != "orthogonal" {
        return Err(TmxError::UnsupportedOrientation {
            path: path.to_path_buf(),
            orientation: orientation.to_string(),
        });
    }
    if ctx.optional_attr::<u8>(root, "infinite")?.unwrap_or(0) != 0 {
        return Err(TmxError::InfiniteMap {
            path: path.to_path_buf(),
        });
    }

    let width = ctx.required_attr::<u32>(root, "width")?;
    let height = ctx.required_attr::<u32>(root, "height")?;
    let tile_width = ctx.required_attr::<u32>(root, "tilewidth")?;
    let tile_height = ctx.required_attr::<u32>(root, "tileheight")?;
    let base_dir = parent_dir(path);

    let mut tilesets = Vec::new();
    for node in root
        .children()
        .filter(|node| node.has_tag_name("tileset"))
    {
        tilesets.push(parse_tileset_ref(&ctx, node, &base_dir)?);
    }

    let mut layers = Vec::new();
    let mut obstacles = Vec::new();
    collect_layers(&ctx, root, true, &tilesets, &mut layers, &mut obstacles)?;

    let tilemap = TileMap::new(width, height, tile_width, tile_height, layers, tilesets)
        .map_err(|source| TmxError::Tilemap {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(MapData { tilemap, obstacles })
}

struct ParseContext<'a, 'input> {
    path: &'a Path,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn location(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn optional_attr<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        attribute: &'static str,
    ) -> Result<Option<T>, TmxError> {
        let Some(raw) = node.attribute(attribute) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| TmxError::InvalidAttribute {
                path: self.path.to_path_buf(),
                element: node.tag_name().name().to_string(),
                attribute,
                value: raw.to_string(),
                location: self.location(node),
            })
    }

    fn required_attr<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        attribute: &'static str,
    ) -> Result<T, TmxError> {
        self.optional_attr(node, attribute)?
            .ok_or_else(|| TmxError::MissingAttribute {
                path: self.path.to_path_buf(),
                element: node.tag_name().name().to_string(),
                attribute,
                location: self.location(node),
            })
    }
}

fn collect_layers(
    ctx: &ParseContext<'_, '_>,
    parent: Node<'_, '_>,
    parent_visible: bool,
    tilesets: &[Tileset],
    layers: &mut Vec<TileLayer>,
    obstacles: &mut Vec<Rect>,
) -> Result<(), TmxError> {
    for node in parent.children().filter(|node| node.is_element()) {
        let visible = parent_visible && ctx.optional_attr::<u8>(node, "visible")?.unwrap_or(1) != 0;
        match node.tag_name().name() {
            "layer" => layers.push(parse_tile_layer(ctx, node, visible)?),
            // Hidden object groups still block movement.
            "objectgroup" => {
                for object in node.children().filter(|child| child.has_tag_name("object")) {
                    obstacles.push(parse_object_rect(ctx, object, tilesets)?);
                }
            }
            "group" => collect_layers(ctx, node, visible, tilesets, layers, obstacles)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_tile_layer(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
    visible: bool,
) -> Result<TileLayer, TmxError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let Some(data) = node.children().find(|child| child.has_tag_name("data")) else {
        return Ok(TileLayer::new(name, visible, Vec::new()));
    };

    if let Some(compression) = data.attribute("compression") {
        return Err(TmxError::UnsupportedCompression {
            path: ctx.path.to_path_buf(),
            layer: name,
            compression: compression.to_string(),
        });
    }

    let tiles = match data.attribute("encoding") {
        Some("csv") => parse_csv_gids(ctx, data, &name)?,
        None => parse_xml_gids(ctx, data, &name)?,
        Some(other) => {
            return Err(TmxError::UnsupportedEncoding {
                path: ctx.path.to_path_buf(),
                layer: name,
                encoding: other.to_string(),
            })
        }
    };
    Ok(TileLayer::new(name, visible, tiles))
}

fn parse_csv_gids(
    ctx: &ParseContext<'_, '_>,
    data: Node<'_, '_>,
    layer: &str,
) -> Result<Vec<u32>, TmxError> {
    data.text()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<u32>().map_err(|_| TmxError::InvalidGid {
                path: ctx.path.to_path_buf(),
                layer: layer.to_string(),
                value: value.to_string(),
                location: ctx.location(data),
            })
        })
        .collect()
}

fn parse_xml_gids(
    ctx: &ParseContext<'_, '_>,
    data: Node<'_, '_>,
    layer: &str,
) -> Result<Vec<u32>, TmxError> {
    data.children()
        .filter(|child| child.has_tag_name("tile"))
        .map(|tile| {
            let raw = tile.attribute("gid").unwrap_or("0");
            raw.parse::<u32>().map_err(|_| TmxError::InvalidGid {
                path: ctx.path.to_path_buf(),
                layer: layer.to_string(),
                value: raw.to_string(),
                location: ctx.location(tile),
            })
        })
        .collect()
}

/// Tile objects (`gid` set) are anchored at their bottom-left corner and
/// default to the tile size of their tileset.
fn parse_object_rect(
    ctx: &ParseContext<'_, '_>,
    object: Node<'_, '_>,
    tilesets: &[Tileset],
) -> Result<Rect, TmxError> {
    let x = ctx.optional_attr(object, "x")?.unwrap_or(0.0);
    let y = ctx.optional_attr(object, "y")?.unwrap_or(0.0);
    let width = ctx.optional_attr::<f64>(object, "width")?;
    let height = ctx.optional_attr::<f64>(object, "height")?;

    let tileset = ctx
        .optional_attr::<u32>(object, "gid")?
        .and_then(|gid| tileset_for_gid(tilesets, strip_gid_flags(gid)));
    let Some(tileset) = tileset else {
        return Ok(Rect::new(
            x,
            y,
            width.unwrap_or(0.0),
            height.unwrap_or(0.0),
        ));
    };

    let tile_width = tileset.tile_width as f64;
    let tile_height = tileset.tile_height as f64;
    Ok(Rect::new(
        x,
        y - tile_height,
        width.filter(|w| *w > 0.0).unwrap_or(tile_width),
        height.filter(|h| *h > 0.0).unwrap_or(tile_height),
    ))
}

fn tileset_for_gid(tilesets: &[Tileset], gid: u32) -> Option<&Tileset> {
    if gid == 0 {
        return None;
    }
    tilesets
        .iter()
        .filter(|tileset| tileset.first_gid <= gid)
        .max_by_key(|tileset| tileset.first_gid)
}

fn parse_tileset_ref(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
    base_dir: &Path,
) -> Result<Tileset, TmxError> {
    let first_gid = ctx.required_attr::<u32>(node, "firstgid")?;
    let Some(source) = node.attribute("source") else {
        return parse_tileset_body(ctx, node, first_gid, base_dir);
    };

    let tsx_path = base_dir.join(source);
    let raw = read_file(&tsx_path)?;
    let doc = parse_document(&raw, &tsx_path)?;
    let tsx_ctx = ParseContext {
        path: &tsx_path,
        doc: &doc,
    };
    let root = doc.root_element();
    if root.tag_name().name() != "tileset" {
        return Err(TmxError::InvalidRoot {
            path: tsx_path.clone(),
            expected: "tileset",
            found: root.tag_name().name().to_string(),
        });
    }
    parse_tileset_body(&tsx_ctx, root, first_gid, &parent_dir(&tsx_path))
}

fn parse_tileset_body(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
    first_gid: u32,
    base_dir: &Path,
) -> Result<Tileset, TmxError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let tile_width = ctx.required_attr::<u32>(node, "tilewidth")?;
    let tile_height = ctx.required_attr::<u32>(node, "tileheight")?;
    let margin = ctx.optional_attr::<u32>(node, "margin")?.unwrap_or(0);
    let spacing = ctx.optional_attr::<u32>(node, "spacing")?.unwrap_or(0);

    let Some(image) = node.children().find(|child| child.has_tag_name("image")) else {
        return Err(TmxError::MissingTilesetImage {
            path: ctx.path.to_path_buf(),
            name,
        });
    };
    let image_source = ctx.required_attr::<String>(image, "source")?;
    let image_width = ctx.optional_attr::<u32>(image, "width")?;
    let image_height = ctx.optional_attr::<u32>(image, "height")?;

    // Older Tiled files omit columns/tilecount; derive them from the image size.
    let columns = match ctx.optional_attr::<u32>(node, "columns")? {
        Some(columns) => columns,
        None => image_width
            .map(|w| tiles_along(w, tile_width, margin, spacing))
            .unwrap_or(0),
    };
    let tile_count = match ctx.optional_attr::<u32>(node, "tilecount")? {
        Some(count) => count,
        None => image_height
            .map(|h| columns.saturating_mul(tiles_along(h, tile_height, margin, spacing)))
            .unwrap_or(0),
    };

    Ok(Tileset {
        first_gid,
        name,
        tile_width,
        tile_height,
        tile_count,
        columns,
        margin,
        spacing,
        image: base_dir.join(image_source),
    })
}

fn tiles_along(extent: u32, tile: u32, margin: u32, spacing: u32) -> u32 {
    let usable = extent
        .saturating_sub(margin.saturating_mul(2))
        .saturating_add(spacing);
    usable / tile.saturating_add(spacing).max(1)
}

fn parse_document<'input>(raw: &'input str, path: &Path) -> Result<Document<'input>, TmxError> {
    Document::parse(raw).map_err(|source| TmxError::Xml {
        path: path.to_path_buf(),
        location: SourceLocation {
            line: source.pos().row as usize,
            column: source.pos().col as usize,
        },
        source,
    })
}

fn read_file(path: &Path) -> Result<String, TmxError> {
    fs::read_to_string(path).map_err(|source| TmxError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CSV_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="3" height="2" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="terrain" tilewidth="16" tileheight="16" tilecount="4" columns="2">
  <image source="terrain.png" width="32" height="32"/>
 </tileset>
 <layer id="1" name="ground" width="3" height="2">
  <data encoding="csv">
1,2,3,
4,0,2147483649
</data>
 </layer>
 <objectgroup id="2" name="walls">
  <object id="1" x="110" y="90" width="40" height="40"/>
  <object id="2" x="0.5" y="12.25" width="8" height="4"/>
  <object id="3" x="5" y="5"><point/></object>
 </objectgroup>
 <layer id="3" name="decor" width="3" height="2" visible="0">
  <data>
   <tile gid="1"/><tile/><tile gid="2"/>
   <tile/><tile/><tile gid="3"/>
  </data>
 </layer>
</map>
"#;

    #[test]
    fn parses_layers_tilesets_and_obstacles_in_document_order() {
        let map = parse_tmx(CSV_MAP, Path::new("maps/test.tmx")).expect("map");
        let tilemap = &map.tilemap;

        assert_eq!((tilemap.width(), tilemap.height()), (3, 2));
        assert_eq!(tilemap.tile_size(), (16, 16));
        assert_eq!(tilemap.layers().len(), 2);
        assert_eq!(tilemap.layers()[0].name, "ground");
        assert!(tilemap.layers()[0].visible);
        assert_eq!(tilemap.layers()[0].tiles(), &[1, 2, 3, 4, 0, 0x8000_0001]);
        assert_eq!(tilemap.resolve_gid(0x8000_0001), Some((0, 0)));
        assert!(!tilemap.layers()[1].visible);
        assert_eq!(tilemap.layers()[1].tiles(), &[1, 0, 2, 0, 0, 3]);

        let tileset = &tilemap.tilesets()[0];
        assert_eq!(tileset.name, "terrain");
        assert_eq!(tileset.image, Path::new("maps").join("terrain.png"));
        assert_eq!((tileset.columns, tileset.tile_count), (2, 4));

        assert_eq!(
            map.obstacles,
            vec![
                Rect::new(110.0, 90.0, 40.0, 40.0),
                Rect::new(0.5, 12.25, 8.0, 4.0),
                Rect::new(5.0, 5.0, 0.0, 0.0),
            ]
        );
    }

    #[test]
    fn loads_external_tileset_relative_to_map() {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir_all(dir.path().join("sets")).expect("mkdir");
        fs::write(
            dir.path().join("sets").join("grass.tsx"),
            r#"<tileset name="grass" tilewidth="32" tileheight="32" spacing="2" margin="1">
 <image source="../img/grass.png" width="70" height="36"/>
</tileset>"#,
        )
        .expect("tsx");
        let map_path = dir.path().join("world.tmx");
        fs::write(
            &map_path,
            r#"<map orientation="orthogonal" width="1" height="1" tilewidth="32" tileheight="32">
 <tileset firstgid="5" source="sets/grass.tsx"/>
 <layer name="ground" width="1" height="1"><data encoding="csv">6</data></layer>
</map>"#,
        )
        .expect("tmx");

        let map = load_tmx(&map_path).expect("map");
        let tileset = &map.tilemap.tilesets()[0];

        assert_eq!(tileset.first_gid, 5);
        assert_eq!((tileset.columns, tileset.tile_count), (2, 2));
        assert_eq!(
            tileset.image,
            dir.path().join("sets").join("../img/grass.png")
        );
        assert_eq!(map.tilemap.resolve_gid(6), Some((0, 1)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_tmx(&dir.path().join("nope.tmx")).expect_err("err");
        assert!(matches!(err, TmxError::Read { .. }), "{err}");
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = parse_tmx("<map>\n<layer x=>", Path::new("bad.tmx")).expect_err("err");
        match err {
            TmxError::Xml { location, .. } => {
                assert_eq!(location, SourceLocation { line: 2, column: 10 })
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_map_size_is_reported_with_attribute_name() {
        let err = parse_tmx(
            r#"<map width="2" tilewidth="8" tileheight="8"/>"#,
            Path::new("m.tmx"),
        )
        .expect_err("err");
        match err {
            TmxError::MissingAttribute {
                element, attribute, ..
            } => {
                assert_eq!(element, "map");
                assert_eq!(attribute, "height");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_unsupported_shapes_of_map() {
        let isometric = r#"<map orientation="isometric" width="1" height="1" tilewidth="8" tileheight="8"/>"#;
        assert!(matches!(
            parse_tmx(isometric, Path::new("m.tmx")),
            Err(TmxError::UnsupportedOrientation { .. })
        ));

        let infinite = r#"<map infinite="1" width="1" height="1" tilewidth="8" tileheight="8"/>"#;
        assert!(matches!(
            parse_tmx(infinite, Path::new("m.tmx")),
            Err(TmxError::InfiniteMap { .. })
        ));

        let base64 = r#"<map width="1" height="1" tilewidth="8" tileheight="8">
 <layer name="g"><data encoding="base64">AQAAAA==</data></layer></map>"#;
        assert!(matches!(
            parse_tmx(base64, Path::new("m.tmx")),
            Err(TmxError::UnsupportedEncoding { .. })
        ));

        let zlib = r#"<map width="1" height="1" tilewidth="8" tileheight="8">
 <layer name="g"><data encoding="base64" compression="zlib">eJw=</data></layer></map>"#;
        assert!(matches!(
            parse_tmx(zlib, Path::new("m.tmx")),
            Err(TmxError::UnsupportedCompression { .. })
        ));
    }

    #[test]
    fn layer_size_mismatch_is_rejected() {
        let raw = r#"<map width="2" height="2" tilewidth="8" tileheight="8">
 <layer name="short"><data encoding="csv">1,1,1</data></layer></map>"#;
        let err = parse_tmx(raw, Path::new("m.tmx")).expect_err("err");
        assert!(matches!(
            err,
            TmxError::Tilemap {
                source: TilemapError::TileCountMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn bad_gid_is_reported() {
        let raw = r#"<map width="1" height="1" tilewidth="8" tileheight="8">
 <layer name="g"><data encoding="csv">grass</data></layer></map>"#;
        let err = parse_tmx(raw, Path::new("m.tmx")).expect_err("err");
        assert!(matches!(err, TmxError::InvalidGid { ref value, .. } if value == "grass"));
    }

    #[test]
    fn grouped_layers_inherit_hidden_state_and_objects_are_collected() {
        let raw = r#"<map width="1" height="1" tilewidth="8" tileheight="8">
 <group name="g" visible="0">
  <layer name="inner"><data encoding="csv">0</data></layer>
  <objectgroup><object x="1" y="2" width="3" height="4"/></objectgroup>
 </group>
</map>"#;
        let map = parse_tmx(raw, Path::new("m.tmx")).expect("map");
        assert!(!map.tilemap.layers()[0].visible);
        assert_eq!(map.obstacles, vec![Rect::new(1.0, 2.0, 3.0, 4.0)]);
    }

    #[test]
    fn tile_objects_are_anchored_bottom_left_with_tileset_size() {
        let raw = r#"<map width="4" height="4" tilewidth="16" tileheight="16">
 <tileset firstgid="1" name="props" tilewidth="16" tileheight="16" tilecount="1" columns="1">
  <image source="props.png" width="16" height="16"/>
 </tileset>
 <tileset firstgid="2" name="trees" tilewidth="32" tileheight="48" tilecount="1" columns="1">
  <image source="trees.png" width="32" height="48"/>
 </tileset>
 <objectgroup>
  <object id="1" gid="1" x="16" y="48" width="16" height="16"/>
  <object id="2" gid="2" x="0" y="64"/>
  <object id="3" gid="2147483649" x="32" y="32"/>
 </objectgroup>
</map>"#;
        let map = parse_tmx(raw, Path::new("m.tmx")).expect("map");
        assert_eq!(
            map.obstacles,
            vec![
                Rect::new(16.0, 32.0, 16.0, 16.0),
                Rect::new(0.0, 16.0, 32.0, 48.0),
                Rect::new(32.0, 16.0, 16.0, 16.0),
            ]
        );
    }

    #[test]
    fn oversized_tileset_numbers_saturate_instead_of_overflowing() {
        assert_eq!(tiles_along(34, 16, 1, 0), 2);
        assert_eq!(tiles_along(64, 16, u32::MAX, u32::MAX), 1);
        assert_eq!(tiles_along(u32::MAX, 0, 0, u32::MAX), 1);

        let raw = format!(
            r#"<map width="1" height="1" tilewidth="1" tileheight="1">
 <tileset firstgid="1" name="t" tilewidth="1" tileheight="1">
  <image source="t.png" width="{max}" height="{max}"/>
 </tileset>
</map>"#,
            max = u32::MAX
        );
        let map = parse_tmx(&raw, Path::new("m.tmx")).expect("map");
        let tileset = &map.tilemap.tilesets()[0];
        assert_eq!(tileset.columns, u32::MAX);
        assert_eq!(tileset.tile_count, u32::MAX);
    }
}
