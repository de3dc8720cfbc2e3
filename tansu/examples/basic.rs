//! Basic example of the Tansu container.
//!
//! Declares a small service graph (logger, database, repository,
//! service), layers configuration over it, and lets typed constructor
//! parameters wire themselves from the tree.

use indexmap::indexmap;
use tansu::prelude::*;

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("tansu=debug")
        .init();

    // === Declare the classes the container may build ===
    let c = Container::builder()
        .class(ClassSpec::new("ConsoleLogger").implements("Logger"))
        .class(
            ClassSpec::new("Database")
                // Builtin-typed parameters resolve by name:
                // `database_url` reads the id `database.url`.
                .param(ParamSpec::new("database_url").typed(TypeExpr::named("string")))
                .param(ParamSpec::new("logger").typed(TypeExpr::named("Logger"))),
        )
        .class(
            ClassSpec::new("UserRepository")
                .param(ParamSpec::new("db").typed(TypeExpr::named("Database"))),
        )
        .class(
            ClassSpec::new("UserService")
                .param(ParamSpec::new("repo").typed(TypeExpr::named("UserRepository")))
                .param(ParamSpec::new("logger").typed(TypeExpr::named("Logger"))),
        )
        .build();

    // === Base configuration layer ===
    c.extend(indexmap! {
        "database".to_string() => Entry::Map(indexmap! {
            // `database_url` doubles as an alias for this id.
            "url database_url".to_string() => Entry::from("postgres://localhost/myapp"),
            "debug".to_string() => Entry::from(false),
        }),
        "logger".to_string() => Entry::shared_instance("ConsoleLogger", Args::new()),
        "db".to_string() => Entry::shared_instance("Database", Args::new()),
        "users".to_string() => Entry::Map(indexmap! {
            "repository".to_string() => Entry::shared_instance("UserRepository", Args::new()),
            "service".to_string() => Entry::shared_instance("UserService", Args::new()),
        }),
    })?;

    // === Environment-specific override layer ===
    c.extend(indexmap! {
        "database".to_string() => Entry::Map(indexmap! {
            "debug".to_string() => Entry::from(true),
        }),
    })?;

    // Getting the service settles its whole dependency chain; the
    // logger is shared between the database and the service.
    let service = c.get("users.service")?;
    let service = service.as_object().expect("settles to an object");
    let db = c.get("db")?;
    assert_eq!(
        service.get("repo").unwrap().as_object().unwrap().get("db"),
        Some(db),
    );

    println!("database config:\n{}", c.dump("database")?);
    println!("service graph:\n{}", c.dump("users.service")?);

    Ok(())
}
