//! WDB world database parser.
//!
//! One binary blob holds every world of the title: per-world part and model
//! pointer tables up front, a global image block, a global parts section, and
//! then the offset-addressed part/model sections themselves. Models carry a
//! scene-node (ROI) tree with leveled-of-detail mesh data and an embedded
//! skeletal animation tree; parts carry standalone ROI LOD sets.

use crate::{BinaryReader, Error};
use glam::{Quat, Vec3};

const MODEL_VERSION: u32 = 19;

/// Bits other than the low LOD flags must be clear.
const LOD_FLAG_MASK: u32 = 0xffff_ff04;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Shading {
    Flat,
    Gouraud,
    WireFrame,
}

impl Shading {
    fn from_i8(value: i8, offset: usize) -> Result<Self, Error> {
        Ok(match value {
            0 => Self::Flat,
            1 => Self::Gouraud,
            2 => Self::WireFrame,
            _ => return Err(Error::UnknownShading { value, offset }),
        })
    }
}

/// Indexed-color raster image, expanded to RGB24 at parse time.
#[derive(Clone, Debug)]
pub struct Gif {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Row-major RGB24, `width * height * 3` bytes.
    pub image: Vec<u8>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: f32,
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<[f32; 2]>,
    /// Triangle list, clockwise after the parse-time winding reversal.
    pub indices: Vec<u32>,
    pub color: Color,
    pub use_color_alias: bool,
    pub texture_name: String,
    pub material_name: String,
    pub shading: Shading,
}

/// One level of detail of a ROI.
///
/// Meshes whose texture or material name starts with `inh` land in
/// [`Lod::meshes_after_offset`]; everything else in
/// [`Lod::meshes_before_offset`]. The split carries paint-order semantics:
/// callers must render the "before" group first. It is never merged.
#[derive(Clone, Debug, Default)]
pub struct Lod {
    pub meshes_before_offset: Vec<Mesh>,
    pub meshes_after_offset: Vec<Mesh>,
}

impl Lod {
    pub fn len(&self) -> usize {
        self.meshes_before_offset.len() + self.meshes_after_offset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All meshes in paint order.
    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        self.meshes_before_offset
            .iter()
            .chain(self.meshes_after_offset.iter())
    }
}

/// A named scene node. LOD 0 is the highest detail.
#[derive(Clone, Debug)]
pub struct Roi {
    pub name: String,
    pub lods: Vec<Lod>,
    pub children: Vec<Roi>,
    pub texture_name: String,
    pub position: Vec3,
}

#[derive(Clone, Debug)]
pub struct Part {
    pub name: String,
    pub lods: Vec<Lod>,
}

#[derive(Clone, Debug)]
pub struct Model {
    pub roi: Roi,
    pub animation: Animation,
    pub position: Vec3,
    pub rotation: Vec3,
    pub up: Vec3,
    pub visible: bool,
}

#[derive(Clone, Debug, Default)]
pub struct World {
    pub name: String,
    pub parts: Vec<Part>,
    pub models: Vec<Model>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActorType {
    Unknown,
    ManagedActor,
    ManagedInvisibleRoiTrimmed,
    ManagedInvisibleRoi,
    SceneRoi1,
    SceneRoi2,
}

impl ActorType {
    fn from_u32(value: u32, offset: usize) -> Result<Self, Error> {
        Ok(match value {
            1 => Self::Unknown,
            2 => Self::ManagedActor,
            3 => Self::ManagedInvisibleRoiTrimmed,
            4 => Self::ManagedInvisibleRoi,
            5 => Self::SceneRoi1,
            6 => Self::SceneRoi2,
            _ => return Err(Error::UnknownActorType { value, offset }),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Actor {
    pub name: String,
    pub kind: ActorType,
}

/// 24-bit time and 8-bit flags, packed into one u32 on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimeAndFlags {
    pub time: u32,
    pub flags: u8,
}

#[derive(Clone, Debug)]
pub struct VertexKey {
    pub time_and_flags: TimeAndFlags,
    pub vertex: Vec3,
}

#[derive(Clone, Debug)]
pub struct RotationKey {
    pub time_and_flags: TimeAndFlags,
    pub quaternion: Quat,
}

#[derive(Clone, Debug)]
pub struct MorphKey {
    pub time_and_flags: TimeAndFlags,
    pub enabled: bool,
}

/// Transform tree parallel to the ROI tree by node name.
#[derive(Clone, Debug)]
pub struct AnimationNode {
    pub name: String,
    pub translation_keys: Vec<VertexKey>,
    pub rotation_keys: Vec<RotationKey>,
    pub scale_keys: Vec<VertexKey>,
    pub morph_keys: Vec<MorphKey>,
    pub children: Vec<AnimationNode>,
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub actors: Vec<Actor>,
    pub duration: i32,
    pub tree: AnimationNode,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TextureSource {
    Model,
    Part,
    Image,
}

impl TextureSource {
    fn label(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Part => "part",
            Self::Image => "image",
        }
    }
}

/// A fully parsed world database.
pub struct WdbFile {
    images: Vec<Gif>,
    textures: Vec<Gif>,
    model_textures: Vec<Gif>,
    global_parts: Vec<Part>,
    worlds: Vec<World>,
}

struct PartPointer {
    offset: u32,
}

struct ModelPointer {
    offset: u32,
    position: Vec3,
    rotation: Vec3,
    up: Vec3,
    visible: bool,
}

struct WorldPointer {
    name: String,
    parts: Vec<PartPointer>,
    models: Vec<ModelPointer>,
}

impl WdbFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let mut parser = Parser {
            reader: BinaryReader::new(bytes),
        };

        let num_worlds = parser.reader.read_u32()?;
        let mut world_pointers = Vec::with_capacity(num_worlds as usize);
        for _ in 0..num_worlds {
            let name = parser.reader.read_string()?;
            let num_parts = parser.reader.read_u32()?;
            let mut parts = Vec::with_capacity(num_parts as usize);
            for _ in 0..num_parts {
                parser.reader.read_string()?;
                let _item_size = parser.reader.read_u32()?;
                let offset = parser.reader.read_u32()?;
                parts.push(PartPointer { offset });
            }
            let num_models = parser.reader.read_u32()?;
            let mut models = Vec::with_capacity(num_models as usize);
            for _ in 0..num_models {
                parser.reader.read_string()?;
                let _size = parser.reader.read_u32()?;
                let offset = parser.reader.read_u32()?;
                parser.reader.read_string()?;
                let position = parser.read_vector3()?;
                let rotation = parser.read_vector3()?;
                let up = parser.read_vector3()?;
                let visible = parser.reader.read_i8()? != 0;
                models.push(ModelPointer {
                    offset,
                    position,
                    rotation,
                    up,
                    visible,
                });
            }
            world_pointers.push(WorldPointer {
                name,
                parts,
                models,
            });
        }

        let _image_chunk_size = parser.reader.read_u32()?;
        let num_frames = parser.reader.read_u32()?;
        let mut images = Vec::with_capacity(num_frames as usize);
        for _ in 0..num_frames {
            images.push(parser.read_gif(None)?);
        }

        let _model_chunk_size = parser.reader.read_u32()?;
        let mut textures = Vec::new();
        let global_offset = parser.reader.position();
        let global_parts = parser.read_parts(global_offset, &mut textures)?;

        let mut model_textures = Vec::new();
        let mut worlds = Vec::with_capacity(world_pointers.len());
        for pointer in world_pointers {
            let mut world = World {
                name: pointer.name,
                ..World::default()
            };
            for part in pointer.parts {
                parser.reader.seek(part.offset as usize)?;
                world
                    .parts
                    .extend(parser.read_parts(part.offset as usize, &mut textures)?);
            }
            for model in pointer.models {
                parser.reader.seek(model.offset as usize)?;
                world
                    .models
                    .push(parser.read_model(model, &mut model_textures)?);
            }
            worlds.push(world);
        }

        log::debug!(
            "parsed wdb: {} worlds, {} images, {} part textures, {} model textures",
            worlds.len(),
            images.len(),
            textures.len(),
            model_textures.len()
        );
        Ok(Self {
            images,
            textures,
            model_textures,
            global_parts,
            worlds,
        })
    }

    pub fn images(&self) -> &[Gif] {
        &self.images
    }

    pub fn textures(&self) -> &[Gif] {
        &self.textures
    }

    pub fn model_textures(&self) -> &[Gif] {
        &self.model_textures
    }

    pub fn global_parts(&self) -> &[Part] {
        &self.global_parts
    }

    pub fn worlds(&self) -> &[World] {
        &self.worlds
    }

    /// Case-insensitive texture lookup within one of the three pools.
    pub fn texture_by_name(&self, name: &str, source: TextureSource) -> Result<&Gif, Error> {
        let textures = match source {
            TextureSource::Model => &self.model_textures,
            TextureSource::Part => &self.textures,
            TextureSource::Image => &self.images,
        };
        textures
            .iter()
            .find(|texture| texture.title.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::TextureNotFound {
                name: name.to_string(),
                pool: source.label(),
            })
    }
}

struct Parser<'a> {
    reader: BinaryReader<'a>,
}

impl<'a> Parser<'a> {
    /// Vectors are stored with the x axis mirrored.
    fn read_vector3(&mut self) -> Result<Vec3, Error> {
        let x = self.reader.read_f32()?;
        let y = self.reader.read_f32()?;
        let z = self.reader.read_f32()?;
        Ok(Vec3::new(-x, y, z))
    }

    fn read_time_and_flags(&mut self) -> Result<TimeAndFlags, Error> {
        let packed = self.reader.read_u32()?;
        Ok(TimeAndFlags {
            time: packed & 0x00ff_ffff,
            flags: (packed >> 24) as u8,
        })
    }

    fn read_gif(&mut self, paired_title: Option<String>) -> Result<Gif, Error> {
        let title = match paired_title {
            Some(title) => title,
            None => self.reader.read_string()?,
        };
        let width = self.reader.read_u32()?;
        let height = self.reader.read_u32()?;
        let num_colors = self.reader.read_u32()? as usize;
        let palette = self.reader.read_bytes(num_colors * 3)?;
        let pixel_count = width as usize * height as usize;
        let pixel_offset = self.reader.position();
        let pixels = self.reader.read_bytes(pixel_count)?;
        let mut image = Vec::with_capacity(pixel_count * 3);
        for &pixel in pixels {
            let index = pixel as usize;
            let color = palette
                .get(index * 3..index * 3 + 3)
                .ok_or(Error::IndexOutOfRange {
                    what: "palette index",
                    index,
                    len: num_colors,
                    offset: pixel_offset,
                })?;
            image.extend_from_slice(color);
        }
        Ok(Gif {
            title,
            width,
            height,
            image,
        })
    }

    /// Reads a texture table entry; a `^`-titled texture is followed by a
    /// paired detail texture sharing the caret-stripped title.
    fn read_texture(&mut self, textures: &mut Vec<Gif>) -> Result<(), Error> {
        let texture = self.read_gif(None)?;
        let paired = texture.title.strip_prefix('^').map(str::to_string);
        textures.push(texture);
        if let Some(title) = paired {
            textures.push(self.read_gif(Some(title))?);
        }
        Ok(())
    }

    fn read_parts(
        &mut self,
        section_offset: usize,
        textures: &mut Vec<Gif>,
    ) -> Result<Vec<Part>, Error> {
        let texture_info_offset = self.reader.read_u32()?;
        let num_rois = self.reader.read_u32()?;
        let mut parts = Vec::with_capacity(num_rois as usize);
        for _ in 0..num_rois {
            let name = self.reader.read_string()?;
            let num_lods = self.reader.read_u32()?;
            let _roi_info_offset = self.reader.read_u32()?;
            let mut lods = Vec::with_capacity(num_lods as usize);
            for _ in 0..num_lods {
                let lod = self.read_lod()?;
                if !lod.is_empty() {
                    lods.push(lod);
                }
            }
            parts.push(Part { name, lods });
        }
        self.reader
            .seek(section_offset + texture_info_offset as usize)?;
        let num_textures = self.reader.read_u32()?;
        for _ in 0..num_textures {
            self.read_texture(textures)?;
        }
        Ok(parts)
    }

    fn read_model(
        &mut self,
        pointer: ModelPointer,
        model_textures: &mut Vec<Gif>,
    ) -> Result<Model, Error> {
        let model_offset = pointer.offset as usize;
        let version_offset = self.reader.position();
        let version = self.reader.read_u32()?;
        if version != MODEL_VERSION {
            return Err(Error::InvalidVersion {
                expected: MODEL_VERSION,
                found: version,
                offset: version_offset,
            });
        }
        let texture_info_offset = self.reader.read_u32()?;
        let _num_rois = self.reader.read_u32()?;
        let animation = self.read_animation()?;
        let roi = self.read_roi(model_offset)?;
        self.reader
            .seek(model_offset + texture_info_offset as usize)?;
        let num_textures = self.reader.read_u32()?;
        let _skipped_textures = self.reader.read_u32()?;
        for _ in 0..num_textures {
            self.read_texture(model_textures)?;
        }
        Ok(Model {
            roi,
            animation,
            position: pointer.position,
            rotation: pointer.rotation,
            up: pointer.up,
            visible: pointer.visible,
        })
    }

    fn read_animation(&mut self) -> Result<Animation, Error> {
        let num_actors = self.reader.read_u32()?;
        let mut actors = Vec::new();
        for _ in 0..num_actors {
            let name = self.reader.read_string()?;
            if !name.is_empty() {
                let type_offset = self.reader.position();
                let kind = ActorType::from_u32(self.reader.read_u32()?, type_offset)?;
                actors.push(Actor {
                    name: name.to_lowercase(),
                    kind,
                });
            }
        }
        let duration = self.reader.read_i32()?;
        let tree = self.read_animation_tree()?;
        Ok(Animation {
            actors,
            duration,
            tree,
        })
    }

    fn read_animation_tree(&mut self) -> Result<AnimationNode, Error> {
        let name = self.reader.read_string()?;

        let num_translation_keys = self.reader.read_u16()?;
        let mut translation_keys = Vec::with_capacity(num_translation_keys as usize);
        for _ in 0..num_translation_keys {
            let time_and_flags = self.read_time_and_flags()?;
            let vertex = self.read_vector3()?;
            translation_keys.push(VertexKey {
                time_and_flags,
                vertex,
            });
        }

        let num_rotation_keys = self.reader.read_u16()?;
        let mut rotation_keys = Vec::with_capacity(num_rotation_keys as usize);
        for _ in 0..num_rotation_keys {
            let time_and_flags = self.read_time_and_flags()?;
            let w = self.reader.read_f32()?;
            let x = -self.reader.read_f32()?;
            let y = self.reader.read_f32()?;
            let z = self.reader.read_f32()?;
            rotation_keys.push(RotationKey {
                time_and_flags,
                quaternion: Quat::from_xyzw(x, y, z, w),
            });
        }

        let num_scale_keys = self.reader.read_u16()?;
        let mut scale_keys = Vec::with_capacity(num_scale_keys as usize);
        for _ in 0..num_scale_keys {
            let time_and_flags = self.read_time_and_flags()?;
            // Scales are not mirrored; undo the x negation of read_vector3.
            let mut vertex = self.read_vector3()?;
            vertex.x = -vertex.x;
            scale_keys.push(VertexKey {
                time_and_flags,
                vertex,
            });
        }

        let num_morph_keys = self.reader.read_u16()?;
        let mut morph_keys = Vec::with_capacity(num_morph_keys as usize);
        for _ in 0..num_morph_keys {
            let time_and_flags = self.read_time_and_flags()?;
            let enabled = self.reader.read_i8()? != 0;
            morph_keys.push(MorphKey {
                time_and_flags,
                enabled,
            });
        }

        let num_children = self.reader.read_u32()?;
        let mut children = Vec::with_capacity(num_children as usize);
        for _ in 0..num_children {
            children.push(self.read_animation_tree()?);
        }
        Ok(AnimationNode {
            name,
            translation_keys,
            rotation_keys,
            scale_keys,
            morph_keys,
            children,
        })
    }

    fn read_roi(&mut self, model_offset: usize) -> Result<Roi, Error> {
        let name = self.reader.read_string()?;
        let sphere_center = self.read_vector3()?;
        let _sphere_radius = self.reader.read_f32()?;
        let _box_min = self.read_vector3()?;
        let _box_max = self.read_vector3()?;
        let texture_name = self.reader.read_string()?;
        let defined_elsewhere = self.reader.read_i8()?;
        let mut lods = Vec::new();
        if defined_elsewhere == 0 {
            let num_lods = self.reader.read_u32()?;
            if num_lods != 0 {
                let end_component_offset = self.reader.read_u32()?;
                for _ in 0..num_lods {
                    lods.push(self.read_lod()?);
                }
                self.reader
                    .seek(model_offset + end_component_offset as usize)?;
            }
        }
        // Nonzero defined_elsewhere: the LOD data lives with the ROI this
        // name aliases (trailing digits are a shared-definition suffix);
        // nothing more to read here.
        let num_children = self.reader.read_u32()?;
        let mut children = Vec::with_capacity(num_children as usize);
        for _ in 0..num_children {
            children.push(self.read_roi(model_offset)?);
        }
        Ok(Roi {
            name,
            lods,
            children,
            texture_name,
            position: sphere_center,
        })
    }

    fn read_vertices(&mut self, count: usize) -> Result<Vec<Vec3>, Error> {
        let mut vertices = Vec::with_capacity(count);
        for _ in 0..count {
            vertices.push(self.read_vector3()?);
        }
        Ok(vertices)
    }

    fn read_lod(&mut self) -> Result<Lod, Error> {
        let flags_offset = self.reader.position();
        let flags = self.reader.read_u32()?;
        if flags & LOD_FLAG_MASK != 0 {
            return Err(Error::InvalidFlags {
                value: flags,
                offset: flags_offset,
            });
        }
        let num_meshes = self.reader.read_u32()?;
        if num_meshes == 0 {
            return Ok(Lod::default());
        }
        let num_verts = self.reader.read_u16()? as usize;
        // The normal count is stored doubled.
        let num_normals = (self.reader.read_u16()? >> 1) as usize;
        let num_text_verts = self.reader.read_u32()? as usize;
        let vertices = self.read_vertices(num_verts)?;
        let normals = self.read_vertices(num_normals)?;
        let mut uvs = Vec::with_capacity(num_text_verts);
        for _ in 0..num_text_verts {
            let u = self.reader.read_f32()?;
            let v = self.reader.read_f32()?;
            uvs.push([u, v]);
        }

        let mut lod = Lod::default();
        for _ in 0..num_meshes {
            let mesh = self.read_mesh(&vertices, &normals, &uvs)?;
            let after_offset = mesh.texture_name.to_lowercase().starts_with("inh")
                || mesh.material_name.to_lowercase().starts_with("inh");
            if after_offset {
                lod.meshes_after_offset.push(mesh);
            } else {
                lod.meshes_before_offset.push(mesh);
            }
        }
        Ok(lod)
    }

    fn read_mesh(
        &mut self,
        vertices: &[Vec3],
        normals: &[Vec3],
        uvs: &[[f32; 2]],
    ) -> Result<Mesh, Error> {
        let num_polys = self.reader.read_u16()? as usize;
        let num_mesh_verts = self.reader.read_u16()? as usize;
        let corner_count = num_polys * 3;
        let mut packed_corners = Vec::with_capacity(corner_count);
        for _ in 0..corner_count {
            packed_corners.push(self.reader.read_u32()?);
        }
        let texture_index_offset = self.reader.position();
        let num_texture_indices = self.reader.read_u32()? as usize;
        let mut texture_indices = Vec::new();
        if num_texture_indices > 0 {
            if num_texture_indices != corner_count {
                return Err(Error::CountMismatch {
                    what: "texture index",
                    expected: corner_count,
                    found: num_texture_indices,
                    offset: texture_index_offset,
                });
            }
            texture_indices.reserve(corner_count);
            for _ in 0..corner_count {
                texture_indices.push(self.reader.read_u32()?);
            }
        }

        let corner_end_offset = self.reader.position();
        let mut mesh_vertices = Vec::new();
        let mut mesh_normals = Vec::new();
        let mut mesh_uvs = Vec::new();
        let mut indices = Vec::with_capacity(corner_count);
        for (corner, &packed) in packed_corners.iter().enumerate() {
            if packed & 0x8000_0000 != 0 {
                // High bit set: this corner introduces a new local vertex.
                indices.push(mesh_vertices.len() as u32);
                let vertex_index = (packed & 0x7fff) as usize;
                mesh_vertices.push(*vertices.get(vertex_index).ok_or(
                    Error::IndexOutOfRange {
                        what: "vertex index",
                        index: vertex_index,
                        len: vertices.len(),
                        offset: corner_end_offset,
                    },
                )?);
                let normal_index = ((packed >> 16) & 0x7fff) as usize;
                mesh_normals.push(*normals.get(normal_index).ok_or(
                    Error::IndexOutOfRange {
                        what: "normal index",
                        index: normal_index,
                        len: normals.len(),
                        offset: corner_end_offset,
                    },
                )?);
                if !texture_indices.is_empty() && !uvs.is_empty() {
                    let uv_index = texture_indices[corner] as usize;
                    mesh_uvs.push(*uvs.get(uv_index).ok_or(Error::IndexOutOfRange {
                        what: "uv index",
                        index: uv_index,
                        len: uvs.len(),
                        offset: corner_end_offset,
                    })?);
                }
            } else {
                // High bit clear: reuse an already-emitted local vertex.
                indices.push(packed & 0x7fff);
            }
        }
        // Swap the 1st and 3rd index of every triple to fix the winding.
        for triple in indices.chunks_exact_mut(3) {
            triple.swap(0, 2);
        }

        if mesh_vertices.len() != num_mesh_verts {
            return Err(Error::CountMismatch {
                what: "mesh vertex",
                expected: num_mesh_verts,
                found: mesh_vertices.len(),
                offset: corner_end_offset,
            });
        }
        if !mesh_uvs.is_empty() && mesh_uvs.len() != num_mesh_verts {
            return Err(Error::CountMismatch {
                what: "mesh uv",
                expected: num_mesh_verts,
                found: mesh_uvs.len(),
                offset: corner_end_offset,
            });
        }

        let red = self.reader.read_u8()?;
        let green = self.reader.read_u8()?;
        let blue = self.reader.read_u8()?;
        let alpha = 1.0 - self.reader.read_f32()?;
        let shading_offset = self.reader.position();
        let shading = Shading::from_i8(self.reader.read_i8()?, shading_offset)?;
        self.reader.skip(2)?;
        let use_color_alias = self.reader.read_u8()? != 0;
        let texture_name = self.reader.read_string()?;
        let material_name = self.reader.read_string()?;

        Ok(Mesh {
            vertices: mesh_vertices,
            normals: mesh_normals,
            uvs: mesh_uvs,
            indices,
            color: Color {
                red,
                green,
                blue,
                alpha,
            },
            use_color_alias,
            texture_name,
            material_name,
            shading,
        })
    }
}
