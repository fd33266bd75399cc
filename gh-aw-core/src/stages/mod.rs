//! Concrete pipeline stages, one module per pipeline component in spec §4.
//! Each implements [`crate::stage::Stage`] and is run in sequence by
//! [`crate::pipeline::Pipeline`].

mod campaign_scaffold_stage;
mod emit_stage;
mod expression_stage;
mod frontmatter_stage;
mod import_stage;
mod model_stage;
mod render_stage;
mod schema_stage;

pub use campaign_scaffold_stage::CampaignScaffoldStage;
pub use emit_stage::EmitStage;
pub use expression_stage::ExpressionStage;
pub use frontmatter_stage::FrontmatterStage;
pub use import_stage::ImportStage;
pub use model_stage::ModelStage;
pub use render_stage::RenderStage;
pub use schema_stage::SchemaStage;
