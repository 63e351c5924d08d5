//! Commands for managing schools and their modules.

use structopt::StructOpt;

use crate::{
    Config,
    Result,
    db,
    models::{Module, School},
};
use super::util::print_table;

#[derive(StructOpt)]
pub struct SchoolOpts {
    #[structopt(subcommand)]
    command: SchoolCommand,
}

#[derive(StructOpt)]
pub enum SchoolCommand {
    /// List schools
    #[structopt(name = "list")]
    List,
    /// Add a school
    #[structopt(name = "add")]
    Add(AddSchoolOpts),
}

#[derive(StructOpt)]
pub struct AddSchoolOpts {
    /// School's name
    name: String,
    #[structopt(long = "description", short = "d", default_value = "")]
    description: String,
}

pub fn schools(cfg: &Config, opts: SchoolOpts) -> Result<()> {
    let db = db::connect(&cfg)?;

    match opts.command {
        SchoolCommand::List => {
            let schools = School::all(&db)?;
            let rows = schools.iter()
                .map(|school| (school.id.to_string(), school.name.as_str()))
                .collect::<Vec<_>>();

            print_table(("ID", "Name"), &rows);
        }
        SchoolCommand::Add(opts) => {
            let school = School::create(&db, &opts.name, &opts.description)?;

            println!("Created school {}", school.id);
        }
    }

    Ok(())
}

#[derive(StructOpt)]
pub struct ModuleOpts {
    #[structopt(subcommand)]
    command: ModuleCommand,
}

#[derive(StructOpt)]
pub enum ModuleCommand {
    /// List modules
    #[structopt(name = "list")]
    List,
    /// Add a module to a school
    #[structopt(name = "add")]
    Add(AddModuleOpts),
}

#[derive(StructOpt)]
pub struct AddModuleOpts {
    /// Name of the school
    school: String,
    /// Module's title
    title: String,
    #[structopt(long = "description", short = "d", default_value = "")]
    description: String,
    /// Position within the school, defaults to after the last module
    #[structopt(long = "position")]
    position: Option<i32>,
}

pub fn modules(cfg: &Config, opts: ModuleOpts) -> Result<()> {
    let db = db::connect(&cfg)?;

    match opts.command {
        ModuleCommand::List => {
            let modules = Module::all_with_schools(&db)?;
            let rows = modules.iter()
                .map(|(module, school)| (
                    module.id.to_string(),
                    school.name.as_str(),
                    module.position.to_string(),
                    module.title.as_str(),
                ))
                .collect::<Vec<_>>();

            print_table(("ID", "School", "Position", "Title"), &rows);
        }
        ModuleCommand::Add(opts) => {
            let school = School::by_name(&db, &opts.school)?;
            let module = Module::create(
                &db, &school, &opts.title, &opts.description, opts.position)?;

            println!("Created module {}", module.id);
        }
    }

    Ok(())
}
