//! CLI commands module

pub mod category;
pub mod group;
pub mod roster;

#[cfg(test)]
mod tests {
    use super::category::CategoryCommand;
    use super::group::GroupCommand;
    use super::roster::RosterCommand;
    use super::*;
    use crate::cli::{CliContext, OutputFormat};
    use crate::error::GroupingError;
    use crate::model::GroupingPolicy;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct CategoryArgs {
        #[command(subcommand)]
        command: CategoryCommand,
    }

    fn context(dir: &tempfile::TempDir) -> CliContext {
        let mut ctx = CliContext::new(dir.path().join("cohort.toml")).unwrap();
        ctx.config.storage.data_dir = dir.path().join("data");
        ctx.output_format = OutputFormat::Json;
        ctx.quiet = true;
        ctx
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_roster_category_and_join_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);

        roster::execute(
            &mut ctx,
            RosterCommand::Set {
                course: "c1".to_string(),
                students: strings(&["ana", "ben", "cai"]),
            },
        )
        .await
        .unwrap();
        category::execute(
            &mut ctx,
            CategoryCommand::Create {
                course: "c1".to_string(),
                name: "Projects".to_string(),
                policy: GroupingPolicy::Free,
                capacity: Some(2),
            },
        )
        .await
        .unwrap();

        let engine = ctx.engine().unwrap();
        let categories = engine.list_categories("c1").await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].capacity_per_group, 2);
        let groups = engine.load_category_groups(&categories[0].id).await.unwrap();
        assert_eq!(groups.len(), 2);

        group::execute(
            &mut ctx,
            GroupCommand::Join {
                group: groups[0].id.clone(),
                student: "ben".to_string(),
            },
        )
        .await
        .unwrap();

        let joined = engine.get_group(&groups[0].id).await.unwrap();
        assert_eq!(joined.member_ids, strings(&["ben"]));
        let unassigned = engine
            .students_without_group("c1", &categories[0].id)
            .await
            .unwrap();
        assert_eq!(unassigned, strings(&["ana", "cai"]));
    }

    #[tokio::test]
    async fn test_negative_capacity_is_a_configuration_error() {
        let args = CategoryArgs::try_parse_from(["category", "capacity", "cat-1", "-3"]).unwrap();
        assert!(matches!(
            args.command,
            CategoryCommand::Capacity { capacity: -3, .. }
        ));

        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir);
        let err = category::execute(&mut ctx, args.command).await.unwrap_err();
        assert!(matches!(err, GroupingError::Configuration(_)));

        let err = category::execute(
            &mut ctx,
            CategoryCommand::Create {
                course: "c1".to_string(),
                name: "Teams".to_string(),
                policy: GroupingPolicy::Random,
                capacity: Some(-1),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GroupingError::Configuration(_)));
        assert!(ctx.engine().unwrap().list_categories("c1").await.unwrap().is_empty());
    }
}
