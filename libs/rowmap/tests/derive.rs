use rowmap::{
    BulkConfig, BulkInsert, DecoderRegistry, MapError, Mappable, MemoryRow, Parameter, Strategy,
    ToParams, ToValue, Value,
};

#[derive(Debug, PartialEq, Mappable, ToParams)]
struct User {
    id: i64,
    name: String,
    nickname: Option<String>,
}

#[derive(Debug, Default, PartialEq, Mappable)]
#[rowmap(default)]
struct Profile {
    user_id: i64,
    bio: Option<String>,
    visits: i32,
}

#[derive(Debug, PartialEq, Mappable, ToParams)]
struct Article {
    #[rowmap(skip_insert)]
    id: i64,
    #[rowmap(rename = "headline")]
    title: String,
    #[rowmap(default = "default_status")]
    status: Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Mappable)]
enum Status {
    Draft = 0,
    Published = 1,
    Archived = 5,
}

#[derive(Debug, PartialEq, Mappable, ToParams)]
struct Tagged<T> {
    id: i64,
    tag: T,
}

fn default_status() -> Status {
    Status::Draft
}

impl ToValue for Status {
    fn to_value(&self) -> Value {
        Value::Int64(*self as i64)
    }
}

#[test]
fn struct_decodes_as_a_record() {
    let registry = DecoderRegistry::new();
    let row = MemoryRow::new()
        .with("id", 1i64)
        .with("name", "ann")
        .with("nickname", Value::Null);

    let user: User = registry.decode_row(&row).unwrap();
    assert_eq!(
        user,
        User {
            id: 1,
            name: "ann".into(),
            nickname: None
        }
    );

    let descriptor = registry.register::<User>().unwrap();
    assert_eq!(descriptor.strategy, Strategy::PositionalRecord);
    assert_eq!(descriptor.field_count, None);
}

#[test]
fn default_struct_decodes_as_a_dto() {
    let registry = DecoderRegistry::new();
    let row = MemoryRow::new().with("UserId", 7i64).with("bio", "hello");

    let profile: Profile = registry.decode_row(&row).unwrap();
    assert_eq!(
        profile,
        Profile {
            user_id: 7,
            bio: Some("hello".into()),
            visits: 0
        }
    );
    assert_eq!(
        registry.register::<Profile>().unwrap().strategy,
        Strategy::DtoProperties
    );
}

#[test]
fn unknown_column_is_reported() {
    let registry = DecoderRegistry::new();
    let row = MemoryRow::new().with("user_id", 7i64).with("extra", 1);
    let err = registry.decode_row::<Profile>(&row).unwrap_err();
    assert!(matches!(
        err,
        MapError::UnknownField { ref field, index: 1, .. } if field == "extra"
    ));
    assert!(err.to_string().contains("Profile"));
}

#[test]
fn all_null_row_is_none_for_optional_targets() {
    let registry = DecoderRegistry::new();
    let row = MemoryRow::new()
        .with("id", Value::Null)
        .with("name", Value::Null)
        .with("nickname", Value::Null);

    assert_eq!(registry.decode_row::<Option<User>>(&row).unwrap(), None);
    assert!(matches!(
        registry.decode_row::<User>(&row),
        Err(MapError::UnexpectedNull { .. })
    ));
}

#[test]
fn missing_required_column_names_the_field() {
    let registry = DecoderRegistry::new();
    let row = MemoryRow::new().with("id", 1i64);
    let err = registry.decode_row::<User>(&row).unwrap_err();
    assert!(matches!(err, MapError::UnexpectedNull { ref field, .. } if field == "name"));
}

#[test]
fn rename_and_default_attributes() {
    let registry = DecoderRegistry::new();
    let row = MemoryRow::new().with("id", 3i64).with("headline", "News");
    let article: Article = registry.decode_row(&row).unwrap();
    assert_eq!(
        article,
        Article {
            id: 3,
            title: "News".into(),
            status: Status::Draft
        }
    );

    let row = row.with("status", 5i64);
    assert_eq!(
        registry.decode_row::<Article>(&row).unwrap().status,
        Status::Archived
    );
}

#[test]
fn enum_rejects_unknown_discriminants() {
    let registry = DecoderRegistry::new();
    assert_eq!(
        registry
            .decode::<Status>(&MemoryRow::new().with("s", 1), 0, 1)
            .unwrap(),
        Status::Published
    );
    assert!(matches!(
        registry.decode::<Status>(&MemoryRow::new().with("s", 3), 0, 1),
        Err(MapError::CastFailure { .. })
    ));
}

#[test]
fn record_and_values_in_one_tuple() {
    let registry = DecoderRegistry::new();
    let row = MemoryRow::new()
        .with("total", 2i64)
        .with("id", 1i64)
        .with("name", "ann")
        .with("nickname", "a")
        .with("NULL", Value::Null)
        .with("tag", "x");

    let (total, user, tag): (i64, User, String) = registry.decode_row(&row).unwrap();
    assert_eq!(total, 2);
    assert_eq!(user.nickname.as_deref(), Some("a"));
    assert_eq!(tag, "x");
}

#[test]
fn to_params_follows_field_order() {
    let user = User {
        id: 1,
        name: "ann".into(),
        nickname: None,
    };
    assert_eq!(
        user.to_params(),
        vec![
            Parameter::new("id", 1i64),
            Parameter::new("name", "ann"),
            Parameter::new("nickname", Value::Null),
        ]
    );
    assert_eq!(user.param_count(), 3);
}

#[test]
fn to_params_skips_and_renames() {
    let article = Article {
        id: 9,
        title: "News".into(),
        status: Status::Published,
    };
    let names: Vec<String> = article.to_params().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["headline", "status"]);
}

#[test]
fn bulk_insert_batches_derived_rows() {
    let users: Vec<User> = (0..5)
        .map(|i| User {
            id: i,
            name: format!("u{i}"),
            nickname: None,
        })
        .collect();
    let bulk = BulkInsert::new(BulkConfig {
        max_rows: 1000,
        max_parameters: 7,
    });

    let batches = bulk.plan(&users).unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].rows, 0..2);
    assert_eq!(batches[0].parameters.len(), 6);
    assert_eq!(batches[2].rows, 4..5);
    assert_eq!(batches[2].parameters[0], Parameter::new("id", 4i64));
}

#[test]
fn generic_struct_decodes_with_its_type_argument() {
    let registry = DecoderRegistry::new();
    let row = MemoryRow::new().with("id", 4i64).with("tag", "red");
    let tagged: Tagged<String> = registry.decode_row(&row).unwrap();
    assert_eq!(
        tagged,
        Tagged {
            id: 4,
            tag: "red".to_string()
        }
    );

    let row = MemoryRow::new().with("id", 4i64).with("tag", Value::Null);
    let tagged: Tagged<Option<i32>> = registry.decode_row(&row).unwrap();
    assert_eq!(tagged.tag, None);
    assert_eq!(
        tagged.to_params(),
        vec![Parameter::new("id", 4i64), Parameter::new("tag", Value::Null)]
    );
}
