use clap::Parser;
use generic_graphql::prelude::*;

////////////////////////////////////////////////////////////////////////////////////////////////////
// Schema
//

pub fn catalog() -> generic_graphql::Result<Catalog> {
    let mut catalog = Catalog::default();
    catalog.declare(
        TypeDescriptor::object("User")
            .description("A registered user.")
            .field("name", TypeExpr::STRING),
    )?;
    catalog.declare(
        TypeDescriptor::object("Post")
            .field("title", TypeExpr::STRING)
            .field("author", TypeExpr::object("User")),
    )?;
    catalog.declare(
        TypeDescriptor::object("Edge")
            .param("T")
            .field("cursor", TypeExpr::ID)
            .field("node", TypeExpr::param("T")),
    )?;
    catalog.declare(
        TypeDescriptor::object("Connection")
            .param("T")
            .field(
                "edges",
                TypeExpr::list(TypeExpr::apply("Edge", [TypeExpr::param("T")])),
            )
            .field("total_count", TypeExpr::INT),
    )?;
    catalog.declare(
        TypeDescriptor::object("Query")
            .field(
                "users",
                TypeExpr::apply("Connection", [TypeExpr::object("User")]),
            )
            .field(
                "posts",
                TypeExpr::apply("Connection", [TypeExpr::object("Post")]),
            )
            .field(
                "search",
                TypeExpr::list(TypeExpr::union([
                    TypeExpr::apply("Edge", [TypeExpr::object("User")]),
                    TypeExpr::apply("Edge", [TypeExpr::object("Post")]),
                ])),
            ),
    )?;
    Ok(catalog)
}

pub fn schema(opt: &Options) -> generic_graphql::Result<Schema> {
    let naming = if opt.graphql_names {
        NameStyle::GraphQl
    } else {
        NameStyle::Short
    };
    Schema::build(catalog()?)
        .config(SchemaConfig::default().naming(naming))
        .finish()
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Test data
//

#[derive(Clone, Debug, Parser)]
pub struct Options {
    /// A query to execute. If not given, the schema is printed instead.
    #[clap(long, env = "EXAMPLE_QUERY")]
    query: Option<String>,
    /// Name synthesized types after GraphQL scalar names (`StringEdge`, not `StrEdge`).
    #[clap(long, env = "EXAMPLE_GRAPHQL_NAMES")]
    graphql_names: bool,
}

fn user(name: &str) -> Instance {
    Instance::new("User").with("name", name)
}

fn edge(cursor: &str, node: Instance) -> Instance {
    Instance::new("Edge")
        .with("cursor", Data::id(cursor))
        .with("node", node)
}

fn connection(edges: Vec<Instance>) -> Instance {
    Instance::new("Connection")
        .with("total_count", edges.len() as i64)
        .with("edges", edges.into_iter().collect::<Data>())
}

pub fn root() -> Instance {
    let ada = user("Ada");
    let grace = user("Grace");
    let post = Instance::new("Post")
        .with("title", "Notes on the Analytical Engine")
        .with("author", ada.clone());
    Instance::new("Query")
        .with(
            "users",
            connection(vec![edge("1", ada.clone()), edge("2", grace)]),
        )
        .with("posts", connection(vec![edge("1", post.clone())]))
        .with(
            "search",
            [edge("1", ada), edge("2", post)]
                .into_iter()
                .collect::<Data>(),
        )
}

#[async_std::main]
async fn main() -> generic_graphql::Result<()> {
    generic_graphql::init_logging();

    let opt = Options::parse();
    let schema = schema(&opt)?;
    match &opt.query {
        Some(query) => {
            let response = schema.execute(query.as_str(), root()).await;
            for error in &response.errors {
                eprintln!("{}", error.message);
            }
            println!("{}", response.data);
        }
        None => println!("{}", schema.sdl()),
    }
    Ok(())
}
