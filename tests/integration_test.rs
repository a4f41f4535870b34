//! Whole-file lifecycle coverage: create, append, read, truncate, reopen —
//! exercised through the public API only, never through the engine's
//! internals.

use chronofile::signature::{FieldDescriptor, RecordDescriptor, TypeMap};
use chronofile::{EngineError, FieldValue, IndexedFile, Record, UniformFile};
use tempfile::NamedTempFile;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct Reading {
    value: f64,
}

impl Record for Reading {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("chronofile::tests::Reading").with_field(FieldDescriptor::primitive("value", "f64"))
    }
    fn to_values(&self) -> Vec<FieldValue> {
        vec![FieldValue::F64(self.value)]
    }
    fn from_values(values: &[FieldValue]) -> Self {
        Self { value: match values[0] { FieldValue::F64(v) => v, other => other.as_i64() as f64 } }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct Tagged {
    key: i64,
    value: f64,
}

impl Record for Tagged {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("chronofile::tests::Tagged")
            .with_field(FieldDescriptor::primitive("key", "i64"))
            .with_field(FieldDescriptor::primitive("value", "f64"))
            .with_index_field("key")
    }
    fn to_values(&self) -> Vec<FieldValue> {
        vec![FieldValue::I64(self.key), FieldValue::F64(self.value)]
    }
    fn from_values(values: &[FieldValue]) -> Self {
        Self { key: values[0].as_i64(), value: match values[1] { FieldValue::F64(v) => v, other => other.as_i64() as f64 } }
    }
    fn index_value(&self) -> Option<i64> {
        Some(self.key)
    }
}

#[test]
fn uniform_full_lifecycle_survives_a_reopen() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();

    {
        let mut f = UniformFile::<Reading>::create(&path, 0, 1_000_000).unwrap();
        let items: Vec<Reading> = (0..20).map(|i| Reading { value: i as f64 * 1.5 }).collect();
        f.append(0, &items).unwrap();
        assert_eq!(f.count(), 20);
        f.close().unwrap();
    }

    let (mut f, report) = UniformFile::<Reading>::open(&path, &TypeMap::new()).unwrap();
    assert_eq!(report.rounded_down_bytes, 0);
    assert_eq!(f.count(), 20);

    let mut out = vec![Reading::default(); 5];
    f.read_by_ordinal(10, &mut out).unwrap();
    for (n, r) in out.iter().enumerate() {
        assert_eq!(r.value, (10 + n) as f64 * 1.5);
    }

    f.truncate(12).unwrap();
    assert_eq!(f.count(), 12);
    f.close().unwrap();

    let (f2, _) = UniformFile::<Reading>::open(&path, &TypeMap::new()).unwrap();
    assert_eq!(f2.count(), 12);
}

#[test]
fn uniform_rejects_reopen_with_a_different_record_layout() {
    let tmp = NamedTempFile::new().unwrap();
    {
        UniformFile::<Reading>::create(tmp.path(), 0, 1).unwrap();
    }
    let err = UniformFile::<Tagged>::open(tmp.path(), &TypeMap::new()).unwrap_err();
    assert!(matches!(err, EngineError::RecordSizeChanged));
}

#[test]
fn indexed_full_lifecycle_survives_a_reopen() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();

    {
        let mut f = IndexedFile::<Tagged>::create(&path).unwrap();
        let items: Vec<Tagged> = (0..15).map(|i| Tagged { key: i * 2, value: i as f64 }).collect();
        f.append(&items).unwrap();
        f.close().unwrap();
    }

    let (mut f, _) = IndexedFile::<Tagged>::open(&path, &TypeMap::new()).unwrap();
    assert_eq!(f.count(), 15);

    let hit = f.search(10).unwrap();
    assert_eq!(hit, 5);
    let miss = f.search(11).unwrap();
    assert!(miss < 0);

    let (lo, hi) = f.range_to_ordinals(4, 14).unwrap();
    let mut out = vec![Tagged::default(); (hi - lo) as usize];
    f.read_by_ordinal(lo, &mut out).unwrap();
    assert!(out.iter().all(|t| t.key >= 4 && t.key < 14));

    f.truncate(10).unwrap();
    f.close().unwrap();

    let (f2, _) = IndexedFile::<Tagged>::open(&path, &TypeMap::new()).unwrap();
    assert_eq!(f2.count(), 10);
}

#[test]
fn indexed_append_after_truncate_continues_from_the_new_tail() {
    let tmp = NamedTempFile::new().unwrap();
    let mut f = IndexedFile::<Tagged>::create(tmp.path()).unwrap();
    f.append(&[Tagged { key: 1, value: 1.0 }, Tagged { key: 5, value: 5.0 }, Tagged { key: 9, value: 9.0 }]).unwrap();
    f.truncate(2).unwrap();
    // tail is now key=5; appending key=3 would violate monotonicity
    let err = f.append(&[Tagged { key: 3, value: 3.0 }]).unwrap_err();
    assert!(matches!(err, EngineError::IndexNonMonotonic));
    f.append(&[Tagged { key: 5, value: 5.5 }]).unwrap();
    assert_eq!(f.count(), 3);
}

#[test]
fn scan_reports_a_healthy_freshly_created_file() {
    let tmp = NamedTempFile::new().unwrap();
    {
        let mut f = UniformFile::<Reading>::create(tmp.path(), 0, 1).unwrap();
        f.append(0, &[Reading { value: 1.0 }, Reading { value: 2.0 }]).unwrap();
        f.close().unwrap();
    }
    let report = chronofile::scan(tmp.path()).unwrap();
    assert_eq!(report.quality, chronofile::RecoveryQuality::Healthy);
    assert_eq!(report.count, Some(2));
}
