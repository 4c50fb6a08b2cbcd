use bytes::Bytes;
use micro_bind::request::UploadSource;
use micro_bind::spec::{FieldSpec, ParamSpec, ParamSpecs, RecordRegistry, RecordSpec, Source, TypeSpec};
use micro_bind::{BindConfig, Binder, ConstraintKind, ErrorKind, RequestDescriptor, UploadPart, Value, bind};
use mockall::mock;
use serde_json::json;
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn item() -> Arc<RecordSpec> {
    RecordSpec::builder("Item")
        .field(FieldSpec::new("name", TypeSpec::Str))
        .field(FieldSpec::new("description", TypeSpec::Str).optional())
        .field(FieldSpec::new("price", TypeSpec::Float))
        .field(FieldSpec::new("tax", TypeSpec::Float).optional())
        .build()
        .unwrap()
}

#[test]
fn numeric_boundaries() {
    let specs = ParamSpecs::new([ParamSpec::path("item_id", TypeSpec::Int).gt(1).le(100)]).unwrap();

    let check = |raw: &str| bind(&specs, &RequestDescriptor::builder().path_param("item_id", raw).build());

    let errors = check("1").unwrap_err();
    assert_eq!(errors.as_slice()[0].kind(), ErrorKind::ConstraintViolated(ConstraintKind::GreaterThan));
    assert_eq!(check("2").unwrap().get("item_id"), Some(&Value::Int(2)));
    assert_eq!(check("100").unwrap().get("item_id"), Some(&Value::Int(100)));
    let errors = check("101").unwrap_err();
    assert_eq!(errors.as_slice()[0].kind(), ErrorKind::ConstraintViolated(ConstraintKind::LessThanEqual));
}

#[test]
fn single_body_param_binds_the_whole_body() {
    let specs = ParamSpecs::new([ParamSpec::body("item", TypeSpec::record(&item()))]).unwrap();
    let request = RequestDescriptor::builder().json(&json!({"name": "Foo", "price": 42.0})).build();

    let bound = bind(&specs, &request).unwrap();
    let item = bound.get("item").unwrap();
    assert_eq!(item.field("name"), Some(&Value::from("Foo")));
    assert_eq!(item.field("price"), Some(&Value::Float(42.0)));
    assert_eq!(item.field("tax"), Some(&Value::Null));
}

#[test]
fn embedded_body_param_needs_its_key() {
    let specs = ParamSpecs::new([ParamSpec::body("item", TypeSpec::record(&item())).embed()]).unwrap();

    let wrapped = RequestDescriptor::builder().json(&json!({"item": {"name": "Foo", "price": 42.0}})).build();
    let bound = bind(&specs, &wrapped).unwrap();
    assert_eq!(bound.get("item").and_then(|item| item.field("name")), Some(&Value::from("Foo")));

    let unwrapped = RequestDescriptor::builder().json(&json!({"name": "Foo", "price": 42.0})).build();
    let errors = bind(&specs, &unwrapped).unwrap_err();
    assert_eq!(errors.len(), 1);
    let error = &errors.as_slice()[0];
    assert_eq!(error.kind(), ErrorKind::MissingRequired);
    assert_eq!(error.name(), "item");
    assert_eq!(error.source(), Source::Body);
}

#[test]
fn repeated_query_keys_and_sequence_defaults() {
    let specs = ParamSpecs::new([ParamSpec::query("q", TypeSpec::seq(TypeSpec::Str)).default(vec!["foo", "bar"])]).unwrap();

    let bound = bind(&specs, &RequestDescriptor::builder().query_string("q=a&q=b").build()).unwrap();
    assert_eq!(bound.get("q"), Some(&Value::from(vec!["a", "b"])));

    let bound = bind(&specs, &RequestDescriptor::default()).unwrap();
    assert_eq!(bound.get("q"), Some(&Value::from(vec!["foo", "bar"])));

    // required, but a wholly absent sequence still binds
    let specs = ParamSpecs::new([ParamSpec::query("q", TypeSpec::seq(TypeSpec::Str))]).unwrap();
    let bound = bind(&specs, &RequestDescriptor::default()).unwrap();
    assert_eq!(bound.get("q"), Some(&Value::Seq(Vec::new())));
}

#[test]
fn every_missing_parameter_is_reported() {
    let specs = ParamSpecs::new([
        ParamSpec::query("needy", TypeSpec::Str),
        ParamSpec::query("skip", TypeSpec::Int).default(0),
        ParamSpec::header("x_token", TypeSpec::Str),
        ParamSpec::cookie("session", TypeSpec::Str),
        ParamSpec::body("item", TypeSpec::record(&item())),
    ])
    .unwrap();

    let errors = bind(&specs, &RequestDescriptor::default()).unwrap_err();
    let missing: Vec<_> = errors.iter().map(|e| (e.source(), e.name().to_string(), e.kind())).collect();
    assert_eq!(
        missing,
        vec![
            (Source::Query, "needy".to_string(), ErrorKind::MissingRequired),
            (Source::Header, "x_token".to_string(), ErrorKind::MissingRequired),
            (Source::Cookie, "session".to_string(), ErrorKind::MissingRequired),
            (Source::Body, "item".to_string(), ErrorKind::MissingRequired),
        ]
    );
}

#[test]
fn errors_are_aggregated_across_sources() {
    let specs = ParamSpecs::new([
        ParamSpec::path("item_id", TypeSpec::Int).ge(1),
        ParamSpec::query("q", TypeSpec::Str).alias("item-query").min_length(3).max_length(50).pattern("^fixedquery$"),
        ParamSpec::query("size", TypeSpec::Float).lt(10.5),
    ])
    .unwrap();
    let request = RequestDescriptor::builder().path_param("item_id", "0").query_string("item-query=ab&size=11").build();

    let errors = bind(&specs, &request).unwrap_err();
    let kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ErrorKind::ConstraintViolated(ConstraintKind::GreaterThanEqual),
            ErrorKind::ConstraintViolated(ConstraintKind::MinLength),
            ErrorKind::ConstraintViolated(ConstraintKind::Pattern),
            ErrorKind::ConstraintViolated(ConstraintKind::LessThan),
        ]
    );
    // errors name the declared parameter, not its alias
    assert_eq!(errors.as_slice()[1].name(), "q");
}

#[test]
fn enum_path_values() {
    let specs = ParamSpecs::new([ParamSpec::path("model_name", TypeSpec::Str).one_of(["alexnet", "resnet", "lenet"])]).unwrap();

    let bound = bind(&specs, &RequestDescriptor::builder().path_param("model_name", "resnet").build()).unwrap();
    assert_eq!(bound.get("model_name"), Some(&Value::from("resnet")));

    let errors = bind(&specs, &RequestDescriptor::builder().path_param("model_name", "vgg").build()).unwrap_err();
    assert_eq!(errors.as_slice()[0].kind(), ErrorKind::ConstraintViolated(ConstraintKind::Enum));
}

#[test]
fn path_containing_parameter() {
    let specs = ParamSpecs::new([ParamSpec::path("file_path", TypeSpec::Str)]).unwrap();
    let request = RequestDescriptor::builder().path_param("file_path", "home/johndoe/myfile.txt").build();
    assert_eq!(bind(&specs, &request).unwrap().get("file_path"), Some(&Value::from("home/johndoe/myfile.txt")));
}

#[test]
fn nested_models_and_dicts() {
    let image = RecordSpec::builder("Image")
        .field(FieldSpec::new("url", TypeSpec::Url))
        .field(FieldSpec::new("name", TypeSpec::Str))
        .build()
        .unwrap();
    let offer = RecordSpec::builder("Offer")
        .field(FieldSpec::new("name", TypeSpec::Str))
        .field(FieldSpec::new("images", TypeSpec::seq(TypeSpec::record(&image))).optional())
        .build()
        .unwrap();
    let specs = ParamSpecs::new([
        ParamSpec::body("offer", TypeSpec::record(&offer)),
        ParamSpec::body("weights", TypeSpec::map(TypeSpec::Int, TypeSpec::Float)),
    ])
    .unwrap();

    let request = RequestDescriptor::builder()
        .json(&json!({
            "offer": {"name": "Foo", "images": [{"url": "http://example.com/baz.jpg", "name": "Baz"}, {"url": "baz", "name": "Bad"}]},
            "weights": {"1": 0.5, "x": 1.0}
        }))
        .build();

    let errors = bind(&specs, &request).unwrap_err();
    let locations: Vec<_> = errors.iter().map(|e| e.location().join(".")).collect();
    assert_eq!(locations, vec!["body.offer.images.1.url", "body.weights.x"]);
}

#[test]
fn binding_is_idempotent() {
    let specs = ParamSpecs::new([
        ParamSpec::path("item_id", TypeSpec::Int),
        ParamSpec::query("q", TypeSpec::seq(TypeSpec::Str)),
        ParamSpec::file("file", TypeSpec::File),
    ])
    .unwrap();
    let request = RequestDescriptor::builder()
        .path_param("item_id", "3")
        .query_string("q=x&q=y")
        .file(UploadPart::from_bytes("file", "a.txt", Some("text/plain".into()), Bytes::from_static(b"abc")))
        .build();

    let first = bind(&specs, &request);
    let second = bind(&specs, &request);
    assert_eq!(first, second);
    assert!(first.is_ok());

    let bad = RequestDescriptor::builder().path_param("item_id", "x").build();
    assert_eq!(bind(&specs, &bad), bind(&specs, &bad));
}

#[test]
fn specs_from_json_bind_like_built_ones() {
    let registry = RecordRegistry::new().with(&item());
    let specs = ParamSpecs::from_json(
        r#"{"params": [
            {"name": "item_id", "in": "path", "type": "int"},
            {"name": "item", "in": "body", "type": "Item"},
            {"name": "user", "in": "body", "type": "dict[str, str]"},
            {"name": "importance", "in": "body", "type": "int", "gt": 0}
        ]}"#,
        &registry,
    )
    .unwrap();

    let request = RequestDescriptor::builder()
        .path_param("item_id", "5")
        .json(&json!({"item": {"name": "Foo", "price": 1}, "user": {"username": "dave"}, "importance": 5}))
        .build();
    let bound = bind(&specs, &request).unwrap();
    assert_eq!(bound.get("importance"), Some(&Value::Int(5)));
    assert_eq!(
        bound.to_json(),
        json!({
            "item_id": 5,
            "item": {"name": "Foo", "description": null, "price": 1.0, "tax": null},
            "user": {"username": "dave"},
            "importance": 5
        })
    );
}

mock! {
    Upload {}

    impl UploadSource for Upload {
        fn open(&self) -> io::Result<Box<dyn Read + Send>>;
    }
}

/// A reader that counts how many of its instances are still alive.
struct TrackedReader {
    inner: Cursor<&'static [u8]>,
    live: Arc<AtomicUsize>,
    fail: bool,
}

impl Read for TrackedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away"));
        }
        self.inner.read(buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

fn tracked_source(live: &Arc<AtomicUsize>, data: &'static [u8], fail: bool) -> MockUpload {
    let mut source = MockUpload::new();
    let live = Arc::clone(live);
    source.expect_open().returning(move || {
        live.fetch_add(1, Ordering::SeqCst);
        let reader: Box<dyn Read + Send> = Box::new(TrackedReader { inner: Cursor::new(data), live: Arc::clone(&live), fail });
        Ok(reader)
    });
    source
}

#[test]
fn upload_streams_are_closed_on_every_path() {
    let live = Arc::new(AtomicUsize::new(0));
    let specs = ParamSpecs::new([
        ParamSpec::file("files", TypeSpec::seq(TypeSpec::Bytes)),
        ParamSpec::form("token", TypeSpec::Str).min_length(10),
    ])
    .unwrap();
    let request = RequestDescriptor::builder()
        .file(UploadPart::new("files", "ok.bin", None, Arc::new(tracked_source(&live, b"payload", false))))
        .file(UploadPart::new("files", "broken.bin", None, Arc::new(tracked_source(&live, b"", true))))
        .file(UploadPart::new("files", "big.bin", None, Arc::new(tracked_source(&live, b"0123456789abcdef", false))))
        .form_field("token", "short")
        .build();

    let errors = Binder::new(BindConfig::new().max_file_size(8)).bind(&specs, &request).unwrap_err();

    let summary: Vec<_> = errors.iter().map(|e| (e.location().join("."), e.kind())).collect();
    assert_eq!(
        summary,
        vec![
            ("file.files.1".to_string(), ErrorKind::UploadFailed),
            ("file.files.2".to_string(), ErrorKind::UploadFailed),
            ("form.token".to_string(), ErrorKind::ConstraintViolated(ConstraintKind::MinLength)),
        ]
    );
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn unopenable_upload_is_not_retried() {
    let mut source = MockUpload::new();
    source.expect_open().times(1).returning(|| Err(io::Error::new(io::ErrorKind::NotFound, "spool file removed")));

    let specs = ParamSpecs::new([ParamSpec::file("file", TypeSpec::File)]).unwrap();
    let request = RequestDescriptor::builder().file(UploadPart::new("file", "a.txt", None, Arc::new(source))).build();

    let errors = bind(&specs, &request).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.as_slice()[0].kind(), ErrorKind::UploadFailed);
    assert!(errors.as_slice()[0].message().contains("spool file removed"));
}
