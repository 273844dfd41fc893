//! End-to-end behaviour over both codecs and a shared registry.

use std::rc::Rc;
use std::sync::Arc;

use arx_archive::{
    shared, ArchiveError, ArchiveResult, ClassMeta, Object, Persist, Reader, Registry, Shared,
    SharedObject, Writer,
};
use proptest::prelude::*;

use crate::{Arx, ArxConfig, Format, SdkError};

#[derive(Debug, Default)]
struct Node {
    label: String,
    next: Option<Shared<Node>>,
}

impl Node {
    fn new(label: &str) -> Shared<Node> {
        shared(Node {
            label: label.into(),
            next: None,
        })
    }
}

impl Persist for Node {
    fn meta() -> ClassMeta {
        ClassMeta::new("Node", 1).tracked()
    }

    fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.field("label", &self.label)?;
        out.field("next", &self.next)
    }

    fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
        input.field("label", &mut self.label)?;
        input.field("next", &mut self.next)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Gain {
    db: f32,
}

impl Persist for Gain {
    fn meta() -> ClassMeta {
        ClassMeta::new("Gain", 0)
    }

    fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.field("db", &self.db)
    }

    fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
        input.field("db", &mut self.db)
    }
}

#[derive(Debug, Default)]
struct Camera {
    serial: String,
    exposure_us: u32,
}

impl Persist for Camera {
    fn meta() -> ClassMeta {
        ClassMeta::new("Camera", 2).tracked()
    }

    fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.field("serial", &self.serial)?;
        out.field("exposure_us", &self.exposure_us)
    }

    fn load(&mut self, input: &mut Reader<'_>, version: u8) -> ArchiveResult<()> {
        input.field("serial", &mut self.serial)?;
        if version >= 2 {
            input.field("exposure_us", &mut self.exposure_us)?;
        }
        Ok(())
    }
}

/// An older build of `Camera` that only knows version 1.
#[derive(Debug, Default)]
struct CameraV1 {
    serial: String,
}

impl Persist for CameraV1 {
    fn meta() -> ClassMeta {
        ClassMeta::new("Camera", 1).tracked()
    }

    fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.field("serial", &self.serial)
    }

    fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
        input.field("serial", &mut self.serial)
    }
}

#[derive(Debug, Default)]
struct Rig {
    devices: Vec<Option<SharedObject>>,
}

impl Persist for Rig {
    fn meta() -> ClassMeta {
        ClassMeta::new("Rig", 0)
    }

    fn save(&self, out: &mut Writer<'_>) -> ArchiveResult<()> {
        out.encode_seq(&self.devices)
    }

    fn load(&mut self, input: &mut Reader<'_>, _version: u8) -> ArchiveResult<()> {
        input.decode_seq(&mut self.devices)
    }
}

fn camera(serial: &str) -> SharedObject {
    shared(Camera {
        serial: serial.into(),
        exposure_us: 500,
    })
}

fn serial_of(object: &SharedObject) -> String {
    let borrowed = object.borrow();
    let object: &dyn Object = &*borrowed;
    object
        .downcast_ref::<Camera>()
        .map(|camera| camera.serial.clone())
        .unwrap_or_default()
}

fn devices() -> Arx {
    let arx = Arx::new();
    arx.register::<Camera>();
    arx.register::<Gain>();
    arx
}

#[test]
fn aliased_pointers_decode_to_one_object() {
    let arx = Arx::new();
    for format in Format::ALL {
        let a = Node::new("a");
        let b = shared(Node {
            label: "b".into(),
            next: Some(a.clone()),
        });
        let bytes = arx
            .save_to_vec_as(format, |out| {
                out.encode_pointer(Some(&a))?;
                out.encode_pointer(Some(&a))?;
                out.encode_pointer(Some(&b))
            })
            .unwrap();

        let (p, q, r) = arx
            .load_from_slice(&bytes, |input| {
                let p = input.decode_pointer::<Node>()?;
                let q = input.decode_pointer::<Node>()?;
                let r = input.decode_pointer::<Node>()?;
                Ok((p.unwrap(), q.unwrap(), r.unwrap()))
            })
            .unwrap();
        assert!(Rc::ptr_eq(&p, &q), "{format}");
        assert!(Rc::ptr_eq(r.borrow().next.as_ref().unwrap(), &p), "{format}");
        assert_eq!(p.borrow().label, "a");
    }
}

#[test]
fn two_node_cycle_keeps_identity() {
    let arx = Arx::new();
    for format in Format::ALL {
        let n1 = Node::new("n1");
        let n2 = Node::new("n2");
        n1.borrow_mut().next = Some(n2.clone());
        n2.borrow_mut().next = Some(n1.clone());

        let bytes = arx
            .save_to_vec_as(format, |out| out.encode_pointer(Some(&n1)))
            .unwrap();
        n1.borrow_mut().next = None;

        let p1 = arx
            .load_from_slice(&bytes, |input| input.decode_pointer::<Node>())
            .unwrap()
            .unwrap();
        let p2 = p1.borrow().next.clone().unwrap();
        let back = p2.borrow().next.clone().unwrap();
        assert!(Rc::ptr_eq(&back, &p1), "{format}");
        assert_eq!(p2.borrow().label, "n2");
        p1.borrow_mut().next = None;
    }
}

const MARK: u8 = 0xA5;

fn mark(input: &mut Reader<'_>) -> ArchiveResult<u8> {
    let mut value = 0u8;
    input.decode(&mut value)?;
    Ok(value)
}

#[test]
fn null_pointers_roundtrip() {
    let arx = devices();
    for format in Format::ALL {
        let bytes = arx
            .save_to_vec_as(format, |out| {
                out.encode_pointer::<Node>(None)?;
                out.encode(&MARK)?;
                out.encode_pointer::<Gain>(None)?;
                out.encode(&MARK)?;
                out.encode_boxed::<Camera>(None)?;
                out.encode(&MARK)?;
                out.encode_dyn_shared(None)?;
                out.encode(&MARK)?;
                out.encode_dyn_boxed(None)?;
                out.encode("end")
            })
            .unwrap();

        let mut source = bytes.as_slice();
        {
            let mut input = arx.reader(&mut source, format).unwrap();
            assert!(input.decode_pointer::<Node>().unwrap().is_none(), "{format}");
            assert_eq!(mark(&mut input).unwrap(), MARK, "{format}");
            assert!(input.decode_pointer::<Gain>().unwrap().is_none(), "{format}");
            assert_eq!(mark(&mut input).unwrap(), MARK, "{format}");
            assert!(input.decode_boxed::<Camera>().unwrap().is_none(), "{format}");
            assert_eq!(mark(&mut input).unwrap(), MARK, "{format}");
            assert!(input.decode_dyn_shared().unwrap().is_none(), "{format}");
            assert_eq!(mark(&mut input).unwrap(), MARK, "{format}");
            assert!(input.decode_dyn_boxed().unwrap().is_none(), "{format}");
            let mut end = String::new();
            input.decode(&mut end).unwrap();
            assert_eq!(end, "end", "{format}");
        }
        match format {
            Format::Binary => assert!(source.is_empty(), "{} bytes left", source.len()),
            Format::Text => assert!(source.iter().all(u8::is_ascii_whitespace)),
        }
    }
}

#[test]
fn newer_class_version_is_rejected() {
    let writer = devices();
    let reader = Arx::new();
    reader.register::<CameraV1>();

    for format in Format::ALL {
        let device = camera("cam-7");
        let bytes = writer
            .save_to_vec_as(format, |out| out.encode_dyn_shared(Some(&device)))
            .unwrap();
        let err = reader
            .load_from_slice(&bytes, |input| input.decode_dyn_shared())
            .unwrap_err();
        match err.as_archive() {
            Some(ArchiveError::ClassVersionMismatch {
                class,
                stored,
                current,
            }) => {
                assert_eq!(class, "Camera");
                assert_eq!((*stored, *current), (2, 1));
            }
            other => panic!("{format}: unexpected {other:?}"),
        }

        let bytes = writer
            .save_to_vec_as(format, |out| out.encode_value(&Camera::default()))
            .unwrap();
        let err = reader
            .load_from_slice(&bytes, |input| {
                input.decode_value(&mut CameraV1::default()).map(|_| ())
            })
            .unwrap_err();
        assert!(matches!(
            err.as_archive(),
            Some(ArchiveError::ClassVersionMismatch { .. })
        ));
    }
}

#[test]
fn older_class_version_is_accepted() {
    let writer = Arx::new();
    writer.register::<CameraV1>();
    let reader = devices();

    for format in Format::ALL {
        let old: SharedObject = shared(CameraV1 {
            serial: "legacy".into(),
        });
        let bytes = writer
            .save_to_vec_as(format, |out| {
                out.encode_value(&CameraV1 {
                    serial: "inline".into(),
                })?;
                out.encode_dyn_shared(Some(&old))
            })
            .unwrap();

        let mut inline = Camera::default();
        let dynamic = reader
            .load_from_slice(&bytes, |input| {
                input.decode_value(&mut inline)?;
                input.decode_dyn_shared()
            })
            .unwrap()
            .unwrap();
        assert_eq!(inline.serial, "inline");
        assert_eq!(inline.exposure_us, 0);
        assert_eq!(serial_of(&dynamic), "legacy", "{format}");
    }
}

#[test]
fn unregistered_class_fails_both_ways() {
    let empty = Arx::new();
    let full = devices();

    for format in Format::ALL {
        let device = camera("ghost");
        let err = empty
            .save_to_vec_as(format, |out| out.encode_dyn_shared(Some(&device)))
            .unwrap_err();
        assert!(
            matches!(
                err.as_archive(),
                Some(ArchiveError::SerializerNotFound { class, .. }) if class == "Camera"
            ),
            "{format}: {err}"
        );

        let bytes = full
            .save_to_vec_as(format, |out| out.encode_dyn_shared(Some(&device)))
            .unwrap();
        let err = empty
            .load_from_slice(&bytes, |input| input.decode_dyn_shared())
            .unwrap_err();
        assert!(
            matches!(
                err.as_archive(),
                Some(ArchiveError::UnregisteredClass(name)) if name == "Camera"
            ),
            "{format}: {err}"
        );
    }
}

#[test]
fn serializers_are_scoped_per_format() {
    let arx = Arx::new();
    arx.registry().register_type::<Camera>(Format::Text.kind());
    let device = camera("text-only");

    assert!(arx
        .save_to_vec_as(Format::Text, |out| out.encode_dyn_shared(Some(&device)))
        .is_ok());
    let err = arx
        .save_to_vec_as(Format::Binary, |out| out.encode_dyn_shared(Some(&device)))
        .unwrap_err();
    assert!(matches!(
        err.as_archive(),
        Some(ArchiveError::SerializerNotFound { .. })
    ));
}

#[test]
fn opening_with_the_wrong_codec_is_unrecognized() {
    let arx = Arx::new();
    let binary = arx.save_to_vec_as(Format::Binary, |out| out.encode(&1i32)).unwrap();
    let text = arx.save_to_vec_as(Format::Text, |out| out.encode(&1i32)).unwrap();

    for (bytes, wrong) in [(&binary, Format::Text), (&text, Format::Binary)] {
        let err = arx
            .load_from_slice_as(wrong, bytes, |_| Ok(()))
            .unwrap_err();
        assert!(
            matches!(
                err.as_archive(),
                Some(ArchiveError::UnrecognizedArchiveFormat { .. })
            ),
            "{wrong}: {err}"
        );
    }
}

#[test]
fn text_integer_and_string() {
    let arx = Arx::new();
    let bytes = arx
        .save_to_vec_as(Format::Text, |out| {
            out.encode(&42i32)?;
            out.encode("héllo")
        })
        .unwrap();
    let wire = String::from_utf8(bytes.clone()).unwrap();
    assert!(wire.contains("5 héllo"), "{wire}");

    let (number, word) = arx
        .load_from_slice(&bytes, |input| {
            let mut number = 0i32;
            let mut word = String::new();
            input.decode(&mut number)?;
            input.decode(&mut word)?;
            Ok((number, word))
        })
        .unwrap();
    assert_eq!(number, 42);
    assert_eq!(word, "héllo");
}

#[test]
fn binary_cycle_preserves_identity() {
    let arx = Arx::new();
    let n1 = Node::new("first");
    let n2 = Node::new("second");
    n1.borrow_mut().next = Some(n2.clone());
    n2.borrow_mut().next = Some(n1.clone());

    let bytes = arx
        .save_to_vec_as(Format::Binary, |out| {
            out.encode_pointer(Some(&n1))?;
            out.encode_pointer(Some(&n2))
        })
        .unwrap();
    n1.borrow_mut().next = None;

    let (p1, p2) = arx
        .load_from_slice(&bytes, |input| {
            let p1 = input.decode_pointer::<Node>()?.unwrap();
            let p2 = input.decode_pointer::<Node>()?.unwrap();
            Ok((p1, p2))
        })
        .unwrap();
    assert!(Rc::ptr_eq(p1.borrow().next.as_ref().unwrap(), &p2));
    assert!(Rc::ptr_eq(p2.borrow().next.as_ref().unwrap(), &p1));
    p1.borrow_mut().next = None;
}

#[test]
fn untracked_pointer_twice_yields_two_copies() {
    let arx = Arx::new();
    for format in Format::ALL {
        let gain = shared(Gain { db: -3.5 });
        let bytes = arx
            .save_to_vec_as(format, |out| {
                out.encode_pointer(Some(&gain))?;
                out.encode_pointer(Some(&gain))
            })
            .unwrap();
        let (first, second) = arx
            .load_from_slice(&bytes, |input| {
                let first = input.decode_pointer::<Gain>()?.unwrap();
                let second = input.decode_pointer::<Gain>()?.unwrap();
                Ok((first, second))
            })
            .unwrap();
        assert!(!Rc::ptr_eq(&first, &second), "{format}");
        assert_eq!(*first.borrow(), *second.borrow());
        assert_eq!(first.borrow().db, -3.5);
    }
}

#[test]
fn polymorphic_aliases_share_one_object() {
    let arx = devices();
    for format in Format::ALL {
        let shared_cam = camera("shared");
        let rig = Rig {
            devices: vec![
                Some(shared_cam.clone()),
                None,
                Some(camera("solo")),
                Some(shared_cam),
            ],
        };
        let bytes = arx
            .save_to_vec_as(format, |out| out.encode_value(&rig))
            .unwrap();
        let mut decoded = Rig::default();
        arx.load_from_slice(&bytes, |input| input.decode_value(&mut decoded))
            .unwrap();

        let devices = &decoded.devices;
        assert_eq!(devices.len(), 4);
        assert!(devices[1].is_none());
        let first = devices[0].as_ref().unwrap();
        let last = devices[3].as_ref().unwrap();
        assert!(Rc::ptr_eq(first, last), "{format}");
        assert_eq!(serial_of(first), "shared");
        assert_eq!(serial_of(devices[2].as_ref().unwrap()), "solo");
    }
}

#[test]
fn registration_order_does_not_change_output() {
    let forward = Arx::new();
    forward.register::<Camera>();
    forward.register::<Gain>();
    forward.register::<Node>();

    let backward = Arx::new();
    backward.register::<Node>();
    backward.register::<Gain>();
    backward.register::<Camera>();

    for format in Format::ALL {
        let gain: SharedObject = shared(Gain { db: 1.0 });
        let rig = Rig {
            devices: vec![Some(camera("a")), Some(gain)],
        };
        let a = forward
            .save_to_vec_as(format, |out| out.encode_value(&rig))
            .unwrap();
        let b = backward
            .save_to_vec_as(format, |out| out.encode_value(&rig))
            .unwrap();
        assert_eq!(a, b, "{format}");
    }
}

#[test]
fn concurrent_sessions_share_one_registry() {
    let registry = Arc::new(Registry::new());
    let arx = Arx::with_registry(Arc::clone(&registry), ArxConfig::default());
    arx.register::<Camera>();

    std::thread::scope(|scope| {
        for worker in 0..8u32 {
            let arx = &arx;
            scope.spawn(move || {
                let format = Format::ALL[worker as usize % 2];
                for round in 0..20u32 {
                    let serial = format!("cam-{worker}-{round}");
                    let device = camera(&serial);
                    let bytes = arx
                        .save_to_vec_as(format, |out| {
                            out.encode_dyn_shared(Some(&device))?;
                            out.encode_dyn_shared(Some(&device))
                        })
                        .unwrap();
                    let (a, b) = arx
                        .load_from_slice(&bytes, |input| {
                            Ok((input.decode_dyn_shared()?, input.decode_dyn_shared()?))
                        })
                        .unwrap();
                    let (a, b) = (a.unwrap(), b.unwrap());
                    assert!(Rc::ptr_eq(&a, &b));
                    assert_eq!(serial_of(&a), serial);
                }
            });
        }
    });
    assert_eq!(registry.classes(Format::Binary.kind()), ["Camera"]);
}

#[test]
fn file_roundtrip_detects_format() {
    let dir = tempfile::tempdir().unwrap();
    for format in Format::ALL {
        let arx = Arx::with_config(ArxConfig::default().with_format(format));
        arx.register::<Camera>();
        let path = dir.path().join(format!("rig.{format}"));

        let device = camera("on-disk");
        arx.save_to_file(&path, |out| {
            out.encode_dyn_shared(Some(&device))?;
            out.encode(&2u64)
        })
        .unwrap_or_else(|e| panic!("{format}: {e}"));

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(Format::detect(&on_disk), Some(format));

        let reader = Arx::with_registry(Arc::clone(arx.registry()), ArxConfig::default());
        let (device, count) = reader
            .load_from_file(&path, |input| {
                let device = input.decode_dyn_shared()?;
                let mut count = 0u64;
                input.decode(&mut count)?;
                Ok((device, count))
            })
            .unwrap();
        assert_eq!(serial_of(device.as_ref().unwrap()), "on-disk");
        assert_eq!(count, 2);
    }
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Arx::new()
        .load_from_file(dir.path().join("absent.arx"), |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, SdkError::Io(_)));
}

#[test]
fn decode_limits_apply_through_config() {
    let strict = Arx::with_config(ArxConfig::default().with_limits(arx_archive::DecodeLimits {
        max_sequence_len: 2,
        ..arx_archive::DecodeLimits::default()
    }));
    strict.register::<Camera>();
    for format in Format::ALL {
        let rig = Rig {
            devices: vec![None, None, None],
        };
        let bytes = strict
            .save_to_vec_as(format, |out| out.encode_value(&rig))
            .unwrap();
        let err = strict
            .load_from_slice(&bytes, |input| input.decode_value(&mut Rig::default()))
            .unwrap_err();
        assert!(matches!(
            err.as_archive(),
            Some(ArchiveError::InvalidDataFormat(_))
        ));
    }
}

proptest! {
    #[test]
    fn labels_roundtrip_in_both_formats(labels in proptest::collection::vec(any::<String>(), 1..5)) {
        let arx = Arx::new();
        let nodes: Vec<Node> = labels
            .iter()
            .map(|label| Node { label: label.clone(), next: None })
            .collect();
        for format in Format::ALL {
            let bytes = arx
                .save_to_vec_as(format, |out| out.encode_values(&nodes))
                .unwrap();
            let mut decoded: Vec<Node> = Vec::new();
            arx.load_from_slice(&bytes, |input| input.decode_values(&mut decoded))
                .unwrap();
            let decoded: Vec<String> = decoded.into_iter().map(|node| node.label).collect();
            prop_assert_eq!(&decoded, &labels);
        }
    }

    #[test]
    fn integers_roundtrip_in_both_formats(a in any::<i64>(), b in any::<u32>(), c in any::<i8>()) {
        let arx = Arx::new();
        for format in Format::ALL {
            let bytes = arx
                .save_to_vec_as(format, |out| {
                    out.encode(&a)?;
                    out.encode(&b)?;
                    out.encode(&c)
                })
                .unwrap();
            let decoded = arx
                .load_from_slice(&bytes, |input| {
                    let (mut x, mut y, mut z) = (0i64, 0u32, 0i8);
                    input.decode(&mut x)?;
                    input.decode(&mut y)?;
                    input.decode(&mut z)?;
                    Ok((x, y, z))
                })
                .unwrap();
            prop_assert_eq!(decoded, (a, b, c));
        }
    }
}
