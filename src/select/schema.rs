//! Static description of the tables a selection tree can reach.
//!
//! Field names are the camelCase names used in payloads; columns are the
//! snake_case SQLite columns from `db.rs`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Bool,
}

#[derive(Debug)]
pub struct Scalar {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
}

#[derive(Debug)]
pub struct Relation {
    pub name: &'static str,
    pub entity: &'static Entity,
    /// Column on the related table holding the parent's `key`.
    pub foreign_key: &'static str,
    pub many: bool,
    /// Extra equality constraints baked into the relation.
    pub fixed: &'static [(&'static str, &'static str)],
}

#[derive(Debug)]
pub struct Entity {
    pub name: &'static str,
    pub table: &'static str,
    /// Column referenced by child relations.
    pub key: &'static str,
    pub order_by: Option<&'static str>,
    pub scalars: &'static [Scalar],
    pub relations: &'static [Relation],
}

impl Entity {
    pub fn scalar(&self, name: &str) -> Option<&'static Scalar> {
        self.scalars.iter().find(|s| s.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.name == name)
    }
}

const fn text(name: &'static str, column: &'static str) -> Scalar {
    Scalar {
        name,
        column,
        kind: ColumnKind::Text,
    }
}

const fn int(name: &'static str, column: &'static str) -> Scalar {
    Scalar {
        name,
        column,
        kind: ColumnKind::Integer,
    }
}

const fn real(name: &'static str, column: &'static str) -> Scalar {
    Scalar {
        name,
        column,
        kind: ColumnKind::Real,
    }
}

const fn flag(name: &'static str, column: &'static str) -> Scalar {
    Scalar {
        name,
        column,
        kind: ColumnKind::Bool,
    }
}

const fn one(name: &'static str, entity: &'static Entity, foreign_key: &'static str) -> Relation {
    Relation {
        name,
        entity,
        foreign_key,
        many: false,
        fixed: &[],
    }
}

const fn many(name: &'static str, entity: &'static Entity, foreign_key: &'static str) -> Relation {
    Relation {
        name,
        entity,
        foreign_key,
        many: true,
        fixed: &[],
    }
}

pub static QUESTION: Entity = Entity {
    name: "question",
    table: "questions",
    key: "id",
    order_by: Some("created_at, id"),
    scalars: &[
        text("id", "id"),
        text("type", "type"),
        text("status", "status"),
        text("source", "source"),
        text("title", "title"),
        text("content", "content"),
        text("scratchpad", "scratchpad"),
        text("groupId", "group_id"),
        text("createdAt", "created_at"),
        text("updatedAt", "updated_at"),
    ],
    relations: &[
        one("multipleChoice", &MULTIPLE_CHOICE, "question_id"),
        one("trueFalse", &TRUE_FALSE, "question_id"),
        one("essay", &ESSAY, "question_id"),
        one("web", &WEB, "question_id"),
        one("exactMatch", &EXACT_MATCH, "question_id"),
        one("code", &CODE, "question_id"),
        one("database", &DATABASE, "question_id"),
        many("tags", &TAG, "question_id"),
        many("studentAnswer", &STUDENT_ANSWER, "question_id"),
    ],
};

pub static TAG: Entity = Entity {
    name: "tag",
    table: "question_tags",
    key: "question_id",
    order_by: Some("label"),
    scalars: &[text("label", "label")],
    relations: &[],
};

pub static MULTIPLE_CHOICE: Entity = Entity {
    name: "multipleChoice",
    table: "multiple_choice",
    key: "question_id",
    order_by: None,
    scalars: &[
        text("gradingPolicy", "grading_policy"),
        flag("activateStudentComment", "activate_student_comment"),
        text("studentCommentLabel", "student_comment_label"),
        flag("activateSelectionLimit", "activate_selection_limit"),
        int("selectionLimit", "selection_limit"),
    ],
    relations: &[many("options", &OPTION, "question_id")],
};

pub static OPTION: Entity = Entity {
    name: "option",
    table: "multiple_choice_options",
    key: "id",
    order_by: Some("order_index, id"),
    scalars: &[
        text("id", "id"),
        int("order", "order_index"),
        text("text", "text"),
        flag("isCorrect", "is_correct"),
    ],
    relations: &[],
};

pub static TRUE_FALSE: Entity = Entity {
    name: "trueFalse",
    table: "true_false",
    key: "question_id",
    order_by: None,
    scalars: &[flag("isTrue", "is_true")],
    relations: &[],
};

pub static ESSAY: Entity = Entity {
    name: "essay",
    table: "essay",
    key: "question_id",
    order_by: None,
    scalars: &[text("solution", "solution"), text("template", "template")],
    relations: &[],
};

pub static WEB: Entity = Entity {
    name: "web",
    table: "web",
    key: "question_id",
    order_by: None,
    scalars: &[
        text("templateHtml", "template_html"),
        text("templateCss", "template_css"),
        text("templateJs", "template_js"),
        text("solutionHtml", "solution_html"),
        text("solutionCss", "solution_css"),
        text("solutionJs", "solution_js"),
    ],
    relations: &[],
};

pub static EXACT_MATCH: Entity = Entity {
    name: "exactMatch",
    table: "exact_match",
    key: "question_id",
    order_by: None,
    scalars: &[text("questionId", "question_id")],
    relations: &[many("fields", &EXACT_MATCH_FIELD, "question_id")],
};

pub static EXACT_MATCH_FIELD: Entity = Entity {
    name: "exactMatchField",
    table: "exact_match_fields",
    key: "id",
    order_by: Some("order_index, id"),
    scalars: &[
        text("id", "id"),
        int("order", "order_index"),
        text("statement", "statement"),
        text("matchRegex", "match_regex"),
    ],
    relations: &[],
};

pub static CODE: Entity = Entity {
    name: "code",
    table: "code",
    key: "question_id",
    order_by: None,
    scalars: &[
        text("language", "language"),
        text("sandboxImage", "sandbox_image"),
        text("sandboxBeforeAll", "sandbox_before_all"),
    ],
    relations: &[
        Relation {
            name: "templateFiles",
            entity: &CODE_FILE,
            foreign_key: "question_id",
            many: true,
            fixed: &[("nature", "TEMPLATE")],
        },
        Relation {
            name: "solutionFiles",
            entity: &CODE_FILE,
            foreign_key: "question_id",
            many: true,
            fixed: &[("nature", "SOLUTION")],
        },
        many("testCases", &CODE_TEST_CASE, "question_id"),
    ],
};

pub static CODE_FILE: Entity = Entity {
    name: "codeFile",
    table: "code_files",
    key: "id",
    order_by: Some("order_index, id"),
    scalars: &[
        text("id", "id"),
        int("order", "order_index"),
        text("path", "path"),
        text("content", "content"),
        text("studentPermission", "student_permission"),
    ],
    relations: &[],
};

pub static CODE_TEST_CASE: Entity = Entity {
    name: "testCase",
    table: "code_test_cases",
    key: "id",
    order_by: Some("idx, id"),
    scalars: &[
        text("id", "id"),
        int("index", "idx"),
        text("exec", "exec"),
        text("input", "input"),
        text("expectedOutput", "expected_output"),
    ],
    relations: &[],
};

pub static DATABASE: Entity = Entity {
    name: "database",
    table: "database_questions",
    key: "question_id",
    order_by: None,
    scalars: &[text("image", "image")],
    relations: &[many("queries", &DATABASE_QUERY, "question_id")],
};

pub static DATABASE_QUERY: Entity = Entity {
    name: "databaseQuery",
    table: "database_queries",
    key: "id",
    order_by: Some("order_index, id"),
    scalars: &[
        text("id", "id"),
        int("order", "order_index"),
        text("title", "title"),
        text("description", "description"),
        text("content", "content"),
        text("template", "template"),
        text("studentPermission", "student_permission"),
    ],
    relations: &[],
};

pub static STUDENT_ANSWER: Entity = Entity {
    name: "studentAnswer",
    table: "student_answers",
    key: "id",
    order_by: Some("user_email"),
    scalars: &[
        text("id", "id"),
        text("userEmail", "user_email"),
        text("status", "status"),
        text("updatedAt", "updated_at"),
    ],
    relations: &[
        many("items", &STUDENT_ANSWER_ITEM, "student_answer_id"),
        one("grading", &GRADING, "student_answer_id"),
    ],
};

pub static STUDENT_ANSWER_ITEM: Entity = Entity {
    name: "studentAnswerItem",
    table: "student_answer_items",
    key: "id",
    order_by: Some("order_index, id"),
    scalars: &[
        text("id", "id"),
        int("order", "order_index"),
        text("ref", "item_ref"),
        text("content", "content"),
    ],
    relations: &[],
};

pub static GRADING: Entity = Entity {
    name: "grading",
    table: "student_answer_gradings",
    key: "student_answer_id",
    order_by: None,
    scalars: &[
        text("status", "status"),
        real("pointsObtained", "points_obtained"),
        text("signedBy", "signed_by"),
        text("comment", "comment"),
        text("updatedAt", "updated_at"),
    ],
    relations: &[],
};
