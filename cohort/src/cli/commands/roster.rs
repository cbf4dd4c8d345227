use crate::cli::CliContext;
use crate::cli::OutputFormatter;
use crate::error::GroupingResult;
use crate::store::RosterSource;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum RosterCommand {
    /// Replace the roster of a course
    Set {
        /// Course ID
        course: String,

        /// Student IDs, in enrollment order
        students: Vec<String>,
    },

    /// Enroll students in a course
    Enroll {
        /// Course ID
        course: String,

        /// Student IDs
        #[arg(required = true)]
        students: Vec<String>,
    },

    /// Remove a student from a course
    Unenroll {
        /// Course ID
        course: String,

        /// Student ID
        student: String,
    },

    /// Show the roster of a course
    Show {
        /// Course ID
        course: String,
    },
}

pub async fn execute(ctx: &mut CliContext, command: RosterCommand) -> GroupingResult<()> {
    let formatter = OutputFormatter::new(ctx.output_format);
    let roster = ctx.roster()?;

    match command {
        RosterCommand::Set { course, students } => {
            let count = students.len();
            roster.set_roster(&course, students)?;
            formatter.success(&format!("Set roster of {} ({} students)", course, count));
        }
        RosterCommand::Enroll { course, students } => {
            let added = roster.enroll(&course, &students)?;
            formatter.success(&format!("Enrolled {} new students in {}", added, course));
            if added < students.len() {
                ctx.status(&format!(
                    "{} students were already enrolled",
                    students.len() - added
                ));
            }
        }
        RosterCommand::Unenroll { course, student } => {
            if roster.unenroll(&course, &student)? {
                formatter.success(&format!("Unenrolled {} from {}", student, course));
            } else {
                formatter.warning(&format!("{} is not enrolled in {}", student, course));
            }
        }
        RosterCommand::Show { course } => {
            let students = roster.list_enrolled_students(&course).await?;
            if formatter.is_json() {
                formatter.json(&students);
            } else if students.is_empty() {
                formatter.success(&format!("No students enrolled in {}", course));
            } else {
                formatter.students(&format!("Roster of {}", course), &students);
            }
        }
    }

    Ok(())
}
