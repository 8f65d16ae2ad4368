diesel::table! {
    artifacts (id) {
        id -> Integer,
        digest -> Text,
        size -> BigInt,
        relative_path -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    content (id) {
        id -> Integer,
        content_type -> Text,
        artifact_digest -> Text,
        filename -> Text,
        packagetype -> Text,
        name -> Text,
        version -> Text,
        metadata_version -> Nullable<Text>,
        summary -> Nullable<Text>,
        description -> Nullable<Text>,
        keywords -> Nullable<Text>,
        home_page -> Nullable<Text>,
        download_url -> Nullable<Text>,
        author -> Nullable<Text>,
        author_email -> Nullable<Text>,
        maintainer -> Nullable<Text>,
        maintainer_email -> Nullable<Text>,
        license -> Nullable<Text>,
        requires_python -> Nullable<Text>,
        project_url -> Nullable<Text>,
        platform -> Nullable<Text>,
        supported_platform -> Nullable<Text>,
        classifiers -> Jsonb,
        project_urls -> Jsonb,
        requires_dist -> Jsonb,
        provides_dist -> Jsonb,
        obsoletes_dist -> Jsonb,
        requires_external -> Jsonb,
        created_at -> Text,
    }
}

diesel::table! {
    repositories (id) {
        id -> Integer,
        name -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    repository_versions (id) {
        id -> Integer,
        repository_id -> Integer,
        number -> Integer,
        created_at -> Text,
    }
}

diesel::table! {
    repository_version_content (version_id, content_id) {
        version_id -> Integer,
        content_id -> Integer,
    }
}

diesel::table! {
    remotes (id) {
        id -> Integer,
        name -> Text,
        url -> Text,
        created_at -> Text,
        last_updated -> Text,
    }
}

diesel::table! {
    publishers (id) {
        id -> Integer,
        name -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    publications (id) {
        id -> Integer,
        publisher_id -> Integer,
        repository_version_id -> Integer,
        job_id -> Nullable<Integer>,
        created_at -> Text,
    }
}

diesel::table! {
    jobs (id) {
        id -> Integer,
        operation -> Text,
        state -> Text,
        payload -> Jsonb,
        worker -> Nullable<Text>,
        error -> Nullable<Text>,
        result -> Nullable<Jsonb>,
        enqueued_at -> BigInt,
        started_at -> Nullable<BigInt>,
        finished_at -> Nullable<BigInt>,
    }
}

diesel::table! {
    job_resources (job_id, resource) {
        job_id -> Integer,
        resource -> Text,
    }
}

diesel::table! {
    reservations (resource) {
        resource -> Text,
        job_id -> Integer,
        worker -> Text,
        lease_expires_at -> BigInt,
    }
}

diesel::joinable!(repository_versions -> repositories (repository_id));
diesel::joinable!(repository_version_content -> repository_versions (version_id));
diesel::joinable!(repository_version_content -> content (content_id));
diesel::joinable!(publications -> publishers (publisher_id));
diesel::joinable!(publications -> repository_versions (repository_version_id));
diesel::joinable!(job_resources -> jobs (job_id));
diesel::joinable!(reservations -> jobs (job_id));

diesel::allow_tables_to_appear_in_same_query!(
    artifacts,
    content,
    repositories,
    repository_versions,
    repository_version_content,
    remotes,
    publishers,
    publications,
    jobs,
    job_resources,
    reservations,
);
