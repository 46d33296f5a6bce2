use crate::{ActorType, BinaryWriter, Error, Shading, TextureSource, WdbFile};
use glam::Vec3;

struct Fixture {
    lod_flags: u32,
    part_texture_indices: u32,
    model_version: u32,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            lod_flags: 0,
            part_texture_indices: 3,
            model_version: 19,
        }
    }
}

fn write_gif(
    writer: &mut BinaryWriter,
    title: Option<&str>,
    colors: &[[u8; 3]],
    width: u32,
    height: u32,
    pixels: &[u8],
) {
    if let Some(title) = title {
        writer.write_cstr(title);
    }
    writer.write_u32(width);
    writer.write_u32(height);
    writer.write_u32(colors.len() as u32);
    for color in colors {
        writer.write_bytes(color);
    }
    writer.write_bytes(pixels);
}

/// One-triangle LOD: three pool vertices, one normal (stored doubled), three
/// UVs, one mesh.
fn write_lod(writer: &mut BinaryWriter, texture_name: &str, flags: u32, texture_indices: u32) {
    writer.write_u32(flags);
    writer.write_u32(1); // meshes
    writer.write_u16(3); // vertices
    writer.write_u16(2); // normals, stored doubled
    writer.write_u32(3); // uvs
    for vertex in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for component in vertex {
            writer.write_f32(component);
        }
    }
    for component in [0.0f32, 0.0, 1.0] {
        writer.write_f32(component);
    }
    for uv in [[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0]] {
        writer.write_f32(uv[0]);
        writer.write_f32(uv[1]);
    }
    // Mesh: one triangle introducing three new local vertices.
    writer.write_u16(1); // polygons
    writer.write_u16(3); // mesh vertices
    writer.write_u32(0x8000_0000);
    writer.write_u32(0x8000_0001);
    writer.write_u32(0x8000_0002);
    writer.write_u32(texture_indices);
    for index in 0..texture_indices {
        writer.write_u32(index);
    }
    writer.write_u8(200);
    writer.write_u8(150);
    writer.write_u8(100);
    writer.write_f32(0.25); // alpha is stored as 1 - value
    writer.write_i8(1); // Gouraud
    writer.write_u8(0);
    writer.write_u8(0);
    writer.write_u8(0); // use_color_alias
    writer.write_cstr(texture_name);
    writer.write_cstr("");
}

fn part_section(fixture: &Fixture) -> Vec<u8> {
    let mut body = BinaryWriter::new();
    body.write_cstr("CHAIR");
    body.write_u32(1); // lods
    body.write_u32(0); // roi info offset
    write_lod(
        &mut body,
        "inh_test",
        fixture.lod_flags,
        fixture.part_texture_indices,
    );
    let body = body.into_vec();

    let mut section = BinaryWriter::new();
    section.write_u32(8 + body.len() as u32); // texture info offset
    section.write_u32(1); // rois
    section.write_bytes(&body);
    section.write_u32(0); // textures
    section.into_vec()
}

fn model_section(fixture: &Fixture) -> Vec<u8> {
    let mut anim = BinaryWriter::new();
    anim.write_u32(2); // actors
    anim.write_cstr("HERO");
    anim.write_u32(2); // ManagedActor
    anim.write_cstr(""); // empty actor names carry no type
    anim.write_i32(1000); // duration
    anim.write_cstr("MODEL");
    anim.write_u16(1); // translation keys
    anim.write_u32((5 << 24) | 123);
    anim.write_f32(1.0);
    anim.write_f32(2.0);
    anim.write_f32(3.0);
    anim.write_u16(0); // rotation keys
    anim.write_u16(0); // scale keys
    anim.write_u16(0); // morph keys
    anim.write_u32(0); // children
    let anim = anim.into_vec();

    let mut roi_prefix = BinaryWriter::new();
    roi_prefix.write_cstr("body");
    for component in [4.0f32, 5.0, 6.0] {
        roi_prefix.write_f32(component); // bounding sphere center
    }
    roi_prefix.write_f32(1.0); // sphere radius
    for _ in 0..6 {
        roi_prefix.write_f32(0.0); // box min/max
    }
    roi_prefix.write_cstr("brick");
    roi_prefix.write_i8(0); // defined here
    roi_prefix.write_u32(1); // lods
    let roi_prefix = roi_prefix.into_vec();

    let mut lod = BinaryWriter::new();
    write_lod(&mut lod, "brick", 0, 3);
    let lod = lod.into_vec();

    // Offsets are relative to the model section start.
    let end_component_offset = 12 + anim.len() as u32 + roi_prefix.len() as u32 + 4 + lod.len() as u32;
    let texture_info_offset = end_component_offset + 4;

    let mut section = BinaryWriter::new();
    section.write_u32(fixture.model_version);
    section.write_u32(texture_info_offset);
    section.write_u32(1); // roi count, informational
    section.write_bytes(&anim);
    section.write_bytes(&roi_prefix);
    section.write_u32(end_component_offset);
    section.write_bytes(&lod);
    section.write_u32(0); // children
    section.write_u32(1); // textures
    section.write_u32(0); // skipped textures
    write_gif(&mut section, Some("^WALL"), &[[1, 2, 3]], 1, 1, &[0]);
    write_gif(&mut section, None, &[[4, 5, 6]], 1, 1, &[0]); // paired detail
    section.into_vec()
}

fn build(fixture: &Fixture, part_offset: u32, model_offset: u32) -> (Vec<u8>, u32, u32) {
    let mut writer = BinaryWriter::new();
    writer.write_u32(1); // worlds
    writer.write_cstr("TEST");
    writer.write_u32(1); // parts
    writer.write_cstr("PART");
    writer.write_u32(0); // item size
    writer.write_u32(part_offset);
    writer.write_u32(1); // models
    writer.write_cstr("MODEL");
    writer.write_u32(0); // size
    writer.write_u32(model_offset);
    writer.write_cstr("");
    for component in [1.0f32, 2.0, 3.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0] {
        writer.write_f32(component); // placement position/rotation/up
    }
    writer.write_i8(1); // visible

    writer.write_u32(0); // image chunk size
    writer.write_u32(1); // frame count
    write_gif(
        &mut writer,
        Some("SKY"),
        &[[10, 20, 30], [40, 50, 60]],
        2,
        1,
        &[0, 1],
    );

    writer.write_u32(0); // model chunk size
    // Empty global parts section.
    writer.write_u32(8);
    writer.write_u32(0);
    writer.write_u32(0);

    let actual_part_offset = writer.len() as u32;
    writer.write_bytes(&part_section(fixture));
    let actual_model_offset = writer.len() as u32;
    writer.write_bytes(&model_section(fixture));
    (writer.into_vec(), actual_part_offset, actual_model_offset)
}

fn fixture_bytes(fixture: &Fixture) -> Vec<u8> {
    // Two passes: the first only measures where the sections land.
    let (_, part_offset, model_offset) = build(fixture, 0, 0);
    let (bytes, part_check, model_check) = build(fixture, part_offset, model_offset);
    assert_eq!((part_offset, model_offset), (part_check, model_check));
    bytes
}

#[test]
fn parses_worlds_parts_and_models() {
    let bytes = fixture_bytes(&Fixture::default());
    let wdb = WdbFile::parse(&bytes).unwrap();

    assert_eq!(wdb.worlds().len(), 1);
    let world = &wdb.worlds()[0];
    assert_eq!(world.name, "TEST");
    assert_eq!(world.parts.len(), 1);
    assert_eq!(world.parts[0].name, "CHAIR");
    assert_eq!(world.models.len(), 1);
    assert!(wdb.global_parts().is_empty());
}

#[test]
fn inh_meshes_land_after_the_offset_with_reversed_winding() {
    let bytes = fixture_bytes(&Fixture::default());
    let wdb = WdbFile::parse(&bytes).unwrap();

    let lod = &wdb.worlds()[0].parts[0].lods[0];
    assert!(lod.meshes_before_offset.is_empty());
    assert_eq!(lod.meshes_after_offset.len(), 1);

    let mesh = &lod.meshes_after_offset[0];
    assert_eq!(mesh.texture_name, "inh_test");
    // The packed stream emits [0, 1, 2]; the parse swaps the 1st and 3rd.
    assert_eq!(mesh.indices, vec![2, 1, 0]);
    assert_eq!(mesh.vertices.len(), 3);
    assert_eq!(mesh.vertices[1], Vec3::new(-1.0, 0.0, 0.0));
    assert_eq!(mesh.uvs.len(), 3);
    assert_eq!(mesh.shading, Shading::Gouraud);
    assert_eq!(mesh.color.alpha, 0.75);
}

#[test]
fn model_roi_and_placement() {
    let bytes = fixture_bytes(&Fixture::default());
    let wdb = WdbFile::parse(&bytes).unwrap();

    let model = &wdb.worlds()[0].models[0];
    assert_eq!(model.position, Vec3::new(-1.0, 2.0, 3.0));
    assert!(model.visible);

    assert_eq!(model.roi.name, "body");
    assert_eq!(model.roi.texture_name, "brick");
    assert_eq!(model.roi.position, Vec3::new(-4.0, 5.0, 6.0));
    assert!(model.roi.children.is_empty());

    let lod = &model.roi.lods[0];
    // Plain texture names stay in the before-offset group.
    assert_eq!(lod.meshes_before_offset.len(), 1);
    assert!(lod.meshes_after_offset.is_empty());
}

#[test]
fn animation_tree_and_actor_list() {
    let bytes = fixture_bytes(&Fixture::default());
    let wdb = WdbFile::parse(&bytes).unwrap();

    let animation = &wdb.worlds()[0].models[0].animation;
    assert_eq!(animation.duration, 1000);
    assert_eq!(animation.actors.len(), 1);
    assert_eq!(animation.actors[0].name, "hero"); // lowercased
    assert_eq!(animation.actors[0].kind, ActorType::ManagedActor);

    assert_eq!(animation.tree.name, "MODEL");
    let key = &animation.tree.translation_keys[0];
    assert_eq!(key.time_and_flags.time, 123);
    assert_eq!(key.time_and_flags.flags, 5);
    assert_eq!(key.vertex, Vec3::new(-1.0, 2.0, 3.0));
}

#[test]
fn images_expand_to_rgb24() {
    let bytes = fixture_bytes(&Fixture::default());
    let wdb = WdbFile::parse(&bytes).unwrap();

    assert_eq!(wdb.images().len(), 1);
    let image = &wdb.images()[0];
    assert_eq!(image.title, "SKY");
    assert_eq!((image.width, image.height), (2, 1));
    assert_eq!(image.image, vec![10, 20, 30, 40, 50, 60]);
}

#[test]
fn caret_textures_read_a_paired_detail_image() {
    let bytes = fixture_bytes(&Fixture::default());
    let wdb = WdbFile::parse(&bytes).unwrap();

    let titles: Vec<&str> = wdb
        .model_textures()
        .iter()
        .map(|texture| texture.title.as_str())
        .collect();
    assert_eq!(titles, vec!["^WALL", "WALL"]);
    assert_eq!(wdb.model_textures()[1].image, vec![4, 5, 6]);
}

#[test]
fn texture_lookup_is_case_insensitive() {
    let bytes = fixture_bytes(&Fixture::default());
    let wdb = WdbFile::parse(&bytes).unwrap();

    assert_eq!(
        wdb.texture_by_name("wall", TextureSource::Model)
            .unwrap()
            .title,
        "WALL"
    );
    assert!(matches!(
        wdb.texture_by_name("wall", TextureSource::Part),
        Err(Error::TextureNotFound { .. })
    ));
}

#[test]
fn wrong_model_version_is_fatal() {
    let bytes = fixture_bytes(&Fixture {
        model_version: 18,
        ..Fixture::default()
    });
    assert!(matches!(
        WdbFile::parse(&bytes),
        Err(Error::InvalidVersion {
            expected: 19,
            found: 18,
            ..
        })
    ));
}

#[test]
fn reserved_lod_flag_bits_are_fatal() {
    let bytes = fixture_bytes(&Fixture {
        lod_flags: 0x04,
        ..Fixture::default()
    });
    assert!(matches!(
        WdbFile::parse(&bytes),
        Err(Error::InvalidFlags { value: 0x04, .. })
    ));
}

#[test]
fn texture_index_count_must_match_corners() {
    let bytes = fixture_bytes(&Fixture {
        part_texture_indices: 2,
        ..Fixture::default()
    });
    assert!(matches!(
        WdbFile::parse(&bytes),
        Err(Error::CountMismatch {
            what: "texture index",
            expected: 3,
            found: 2,
            ..
        })
    ));
}
