//! Per-stage configuration templates and command lines.
//!
//! Everything here is pure: callers decide whether the rendered text is
//! persisted (see `cache`).

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::boulder::BoulderRecord;
use crate::config::{PipelineConfig, Primer3Settings};
use crate::workspace::{Stage, WorkspacePaths};

/// A rendered invocation of one stage's external tool.
///
/// The tool writes its own result to `output_path`; the command line names
/// that file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCommand {
    pub stage: Stage,
    pub command_line: String,
    pub output_path: PathBuf,
}

/// Inputs of the primer3 design template.
#[derive(Debug, Clone, Copy)]
pub struct DesignContext<'a> {
    pub identity: &'a str,
    pub sequence: &'a str,
    pub settings: &'a Primer3Settings,
}

/// Render the primer3 Boulder-IO input record.
pub fn render_design_template(ctx: &DesignContext<'_>) -> String {
    let s = ctx.settings;
    format!(
        "SEQUENCE_ID={identity}
SEQUENCE_TEMPLATE={sequence}
PRIMER_TASK=generic
PRIMER_PICK_LEFT_PRIMER=1
PRIMER_PICK_INTERNAL_OLIGO=0
PRIMER_PICK_RIGHT_PRIMER=1
PRIMER_OPT_SIZE={opt_size}
PRIMER_MIN_SIZE={min_size}
PRIMER_MAX_SIZE={max_size}
PRIMER_OPT_TM={opt_tm:.1}
PRIMER_MIN_TM={min_tm:.1}
PRIMER_MAX_TM={max_tm:.1}
PRIMER_PRODUCT_SIZE_RANGE={product_size_range}
PRIMER_NUM_RETURN={num_return}
PRIMER_EXPLAIN_FLAG={explain}
=
",
        identity = ctx.identity,
        sequence = ctx.sequence,
        opt_size = s.opt_size,
        min_size = s.min_size,
        max_size = s.max_size,
        opt_tm = s.opt_tm,
        min_tm = s.min_tm,
        max_tm = s.max_tm,
        product_size_range = s.product_size_range.trim(),
        num_return = s.num_return,
        explain = u8::from(s.explain),
    )
}

/// Render the primersearch primer file: `<name> <forward> <reverse>` per pair.
///
/// Empty when the design output holds no primer pair.
pub fn render_search_template(design_output: &BoulderRecord) -> String {
    design_output
        .primer_pairs()
        .into_iter()
        .map(|pair| format!("{} {} {}\n", pair.name, pair.forward, pair.reverse))
        .collect()
}

/// `primer3_core --output=<design-output> <design-template>`
pub fn design_command(config: &PipelineConfig, paths: &WorkspacePaths) -> StageCommand {
    StageCommand {
        stage: Stage::Design,
        command_line: format!(
            "{} --output={} {}",
            config.tools.primer3_core,
            shell_quote(&paths.design_output),
            shell_quote(&paths.design_template)
        ),
        output_path: paths.design_output.clone(),
    }
}

/// `primersearch -seqall <genome> -infile <search-template> -mismatchpercent <n> -outfile <search-output>`
pub fn search_command(config: &PipelineConfig, paths: &WorkspacePaths) -> StageCommand {
    StageCommand {
        stage: Stage::Search,
        command_line: format!(
            "{} -seqall {} -infile {} -mismatchpercent {} -outfile {}",
            config.tools.primersearch,
            shell_quote(&config.paths.genome),
            shell_quote(&paths.search_template),
            config.primersearch.mismatch_percent,
            shell_quote(&paths.search_output)
        ),
        output_path: paths.search_output.clone(),
    }
}

/// Quote a path for `sh -c`. Paths made only of safe characters pass through.
pub fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let safe = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:,+@%=".contains(c));
    if safe {
        raw.into_owned()
    } else {
        format!("'{}'", raw.replace('\'', r"'\''"))
    }
}
