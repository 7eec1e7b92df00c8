//! Selection fragments for each facet of a question, and the compositions
//! used by the read paths. No builder touches the database.

use super::tree::{merge, SelectTree};

#[derive(Debug, Clone, Copy, Default)]
pub struct BaseOptions {
    /// Adds the fields only the owning professors may see.
    pub include_professor_only_info: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentScope {
    One(String),
    All,
}

pub fn select_base(opts: BaseOptions) -> SelectTree {
    let tree = SelectTree::new().fields(&[
        "id",
        "type",
        "status",
        "source",
        "content",
        "createdAt",
        "updatedAt",
        "groupId",
    ]);
    if opts.include_professor_only_info {
        tree.fields(&["title", "scratchpad"])
    } else {
        tree
    }
}

/// Every type-specific relation at once; only the one matching the type tag
/// comes back populated. Answer-revealing fields are left out.
pub fn select_type_specific() -> SelectTree {
    SelectTree::new()
        .relation(
            "multipleChoice",
            SelectTree::new()
                .fields(&[
                    "gradingPolicy",
                    "activateStudentComment",
                    "studentCommentLabel",
                    "activateSelectionLimit",
                    "selectionLimit",
                ])
                .relation("options", SelectTree::new().fields(&["id", "order", "text"])),
        )
        .relation("trueFalse", SelectTree::new())
        .relation("essay", SelectTree::new().field("template"))
        .relation(
            "web",
            SelectTree::new().fields(&["templateHtml", "templateCss", "templateJs"]),
        )
        .relation(
            "exactMatch",
            SelectTree::new().relation(
                "fields",
                SelectTree::new().fields(&["id", "order", "statement"]),
            ),
        )
        .relation(
            "code",
            SelectTree::new()
                .fields(&["language", "sandboxImage", "sandboxBeforeAll"])
                .relation(
                    "templateFiles",
                    SelectTree::new().fields(&["id", "order", "path", "content", "studentPermission"]),
                )
                .relation(
                    "testCases",
                    SelectTree::new().fields(&["id", "index", "exec", "input", "expectedOutput"]),
                ),
        )
        .relation(
            "database",
            SelectTree::new().field("image").relation(
                "queries",
                SelectTree::new().fields(&[
                    "id",
                    "order",
                    "title",
                    "description",
                    "template",
                    "studentPermission",
                ]),
            ),
        )
}

pub fn select_tags() -> SelectTree {
    SelectTree::new().relation("tags", SelectTree::new().field("label"))
}

/// The instructor-authored answer of each type.
pub fn select_official_answers() -> SelectTree {
    SelectTree::new()
        .relation(
            "multipleChoice",
            SelectTree::new().relation("options", SelectTree::new().field("isCorrect")),
        )
        .relation("trueFalse", SelectTree::new().field("isTrue"))
        .relation("essay", SelectTree::new().field("solution"))
        .relation(
            "web",
            SelectTree::new().fields(&["solutionHtml", "solutionCss", "solutionJs"]),
        )
        .relation(
            "exactMatch",
            SelectTree::new().relation("fields", SelectTree::new().field("matchRegex")),
        )
        .relation(
            "code",
            SelectTree::new().relation(
                "solutionFiles",
                SelectTree::new().fields(&["id", "order", "path", "content", "studentPermission"]),
            ),
        )
        .relation(
            "database",
            SelectTree::new().relation("queries", SelectTree::new().field("content")),
        )
}

pub fn select_student_answers(scope: &StudentScope) -> SelectTree {
    let answers = SelectTree::new()
        .fields(&["id", "userEmail", "status", "updatedAt"])
        .relation(
            "items",
            SelectTree::new().fields(&["order", "ref", "content"]),
        );
    let answers = match scope {
        StudentScope::One(email) => answers.filter("userEmail", email.as_str()),
        StudentScope::All => answers,
    };
    SelectTree::new().relation("studentAnswer", answers)
}

pub fn select_gradings() -> SelectTree {
    SelectTree::new().relation(
        "studentAnswer",
        SelectTree::new().relation(
            "grading",
            SelectTree::new().fields(&["status", "pointsObtained", "signedBy", "comment"]),
        ),
    )
}

pub fn listing_selection(include_professor_only_info: bool) -> SelectTree {
    merge([
        &select_base(BaseOptions {
            include_professor_only_info,
        }),
        &select_type_specific(),
        &select_tags(),
    ])
}

pub fn consultation_selection(
    include_professor_only_info: bool,
    with_official_answers: bool,
) -> SelectTree {
    let listing = listing_selection(include_professor_only_info);
    if with_official_answers {
        listing.merged(&select_official_answers())
    } else {
        listing
    }
}

/// A student's own export carries their answers; otherwise the official ones.
pub fn export_selection(student: Option<&str>) -> SelectTree {
    let answers = match student {
        Some(email) => select_student_answers(&StudentScope::One(email.to_string())),
        None => select_official_answers(),
    };
    merge([
        &select_base(BaseOptions {
            include_professor_only_info: student.is_none(),
        }),
        &select_type_specific(),
        &answers,
        &select_tags(),
    ])
}

pub fn copy_selection() -> SelectTree {
    merge([
        &select_base(BaseOptions {
            include_professor_only_info: true,
        }),
        &select_type_specific(),
        &select_official_answers(),
        &select_tags(),
    ])
}

pub fn results_selection() -> SelectTree {
    merge([
        &copy_selection(),
        &select_student_answers(&StudentScope::All),
        &select_gradings(),
    ])
}
