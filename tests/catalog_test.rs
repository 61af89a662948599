mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use serial_test::serial;

// ─── Course ownership ────────────────────────────────────────────────────────

#[serial]
#[tokio::test]
async fn test_only_owner_or_admin_can_edit_course() {
    let app = TestApp::new().await;
    let owner = app.signup("x@school.test", "TEACHER").await;
    let other = app.signup("y@school.test", "TEACHER").await;
    let admin = app.signup("admin@school.test", "ADMIN").await;

    let course_id = app.create_course(&owner, "Rust Basics", "Programming", 10.0).await;

    let resp = app
        .put(
            &format!("/courses/{course_id}"),
            Some(&other.token),
            json!({ "title": "Hijacked" }),
        )
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);

    let resp = app
        .put(
            &format!("/courses/{course_id}"),
            Some(&admin.token),
            json!({ "title": "Rust Fundamentals", "price": 15.5 }),
        )
        .await;
    resp.assert_status(StatusCode::OK);
    let json = resp.value();
    assert_eq!(json["title"], "Rust Fundamentals");
    assert_eq!(json["price"], 15.5);
    assert_eq!(json["teacherId"], owner.id);

    app.put(
        &format!("/courses/{course_id}"),
        Some(&owner.token),
        json!({ "description": "Updated by owner" }),
    )
    .await
    .assert_status(StatusCode::OK);

    app.delete(&format!("/courses/{course_id}"), Some(&other.token))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[serial]
#[tokio::test]
async fn test_course_creation_requires_teacher_or_admin() {
    let app = TestApp::new().await;
    let student = app.signup("s@school.test", "USER").await;

    app.post("/courses", Some(&student.token), json!({ "title": "Mine" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.post("/courses", None, json!({ "title": "Anon" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let teacher = app.signup("t@school.test", "TEACHER").await;
    app.post("/courses", Some(&teacher.token), json!({ "price": 3 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.post(
        "/courses",
        Some(&teacher.token),
        json!({ "title": "Negative", "price": -1 }),
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(app.count(entity::course::Entity).await, 0);
}

#[serial]
#[tokio::test]
async fn test_course_owner_assignment() {
    let app = TestApp::new().await;
    let teacher = app.signup("t@school.test", "TEACHER").await;
    let other = app.signup("o@school.test", "TEACHER").await;
    let student = app.signup("s@school.test", "USER").await;
    let admin = app.signup("admin@school.test", "ADMIN").await;

    // A teacher cannot create on someone else's behalf.
    app.post(
        "/courses",
        Some(&teacher.token),
        json!({ "title": "Sneaky", "teacherId": other.id }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    let resp = app
        .post(
            "/courses",
            Some(&admin.token),
            json!({ "title": "Assigned", "teacherId": teacher.id }),
        )
        .await;
    resp.assert_status(StatusCode::CREATED);
    let course_id = resp.value()["id"].as_str().unwrap().to_string();
    assert_eq!(resp.value()["teacherId"], teacher.id);

    app.put(
        &format!("/courses/{course_id}"),
        Some(&admin.token),
        json!({ "teacherId": student.id }),
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST);

    app.put(
        &format!("/courses/{course_id}"),
        Some(&admin.token),
        json!({ "teacherId": "missing-user" }),
    )
    .await
    .assert_status(StatusCode::NOT_FOUND);

    app.put(
        &format!("/courses/{course_id}"),
        Some(&teacher.token),
        json!({ "teacherId": other.id }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    let resp = app
        .put(
            &format!("/courses/{course_id}"),
            Some(&admin.token),
            json!({ "teacherId": other.id }),
        )
        .await;
    resp.assert_status(StatusCode::OK);
    assert_eq!(resp.value()["teacherId"], other.id);

    // The previous owner lost control.
    app.put(
        &format!("/courses/{course_id}"),
        Some(&teacher.token),
        json!({ "title": "Mine again" }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);
}

// ─── Course listing ──────────────────────────────────────────────────────────

#[serial]
#[tokio::test]
async fn test_list_courses_filters_and_paginates() {
    let app = TestApp::new().await;
    let teacher = app.signup("t@school.test", "TEACHER").await;

    app.create_course(&teacher, "Docker Deep Dive", "DevOps", 30.0).await;
    app.create_course(&teacher, "Kubernetes 101", "DevOps", 50.0).await;
    app.create_course(&teacher, "Intro to SQL", "Data", 10.0).await;
    app.create_course(&teacher, "Advanced SQL", "Data", 80.0).await;
    app.create_course(&teacher, "Watercolor", "Art", 0.0).await;
    app.create_course(&teacher, "Oil Painting", "Art", 20.0).await;
    app.create_course(&teacher, "Sketching", "Art", 5.0).await;

    // Default page size is six.
    let resp = app.get("/courses", None).await;
    resp.assert_status(StatusCode::OK);
    let json = resp.value();
    assert_eq!(json["data"].as_array().unwrap().len(), 6);
    assert_eq!(json["pagination"]["total"], 7);
    assert_eq!(json["pagination"]["page"], 1);
    assert_eq!(json["pagination"]["limit"], 6);
    assert_eq!(json["pagination"]["pages"], 2);
    assert_eq!(json["data"][0]["teacher"]["email"], "t@school.test");
    assert_eq!(json["data"][0]["videoCount"], 0);

    let resp = app.get("/courses?page=2", None).await;
    assert_eq!(resp.value()["data"].as_array().unwrap().len(), 1);

    let resp = app.get("/courses?search=sql", None).await;
    let json = resp.value();
    assert_eq!(json["pagination"]["total"], 2);

    let resp = app.get("/courses?category=devops", None).await;
    assert_eq!(resp.value()["pagination"]["total"], 2);

    let resp = app.get("/courses?minPrice=10&maxPrice=30", None).await;
    let json = resp.value();
    let mut titles: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["Docker Deep Dive", "Intro to SQL", "Oil Painting"]);

    let resp = app.get("/courses?order=asc&limit=3", None).await;
    let json = resp.value();
    let prices: Vec<f64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["price"].as_f64().unwrap())
        .collect();
    assert_eq!(prices, vec![0.0, 5.0, 10.0]);
    assert_eq!(json["pagination"]["pages"], 3);

    let resp = app.get("/courses?order=desc&limit=1", None).await;
    assert_eq!(resp.value()["data"][0]["price"], 80.0);
}

#[serial]
#[tokio::test]
async fn test_list_ignores_blank_and_garbage_query_values() {
    let app = TestApp::new().await;
    let teacher = app.signup("t@school.test", "TEACHER").await;
    let course_id = app.create_course(&teacher, "Only", "Misc", 12.0).await;
    app.create_video(&teacher, &course_id, "clip").await;

    let resp = app
        .get(
            "/courses?search=&category=&minPrice=&maxPrice=&order=&page=&limit=",
            None,
        )
        .await;
    resp.assert_status(StatusCode::OK);
    let json = resp.value();
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["pagination"]["page"], 1);
    assert_eq!(json["pagination"]["limit"], 6);

    let resp = app
        .get("/courses?minPrice=cheap&maxPrice=lots&page=first&limit=-2", None)
        .await;
    resp.assert_status(StatusCode::OK);
    let json = resp.value();
    assert_eq!(json["data"][0]["id"], course_id);
    assert_eq!(json["pagination"]["limit"], 6);

    let resp = app
        .get(&format!("/videos?courseId={course_id}&search=&page=&limit="), None)
        .await;
    resp.assert_status(StatusCode::OK);
    let json = resp.value();
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["pagination"]["limit"], 10);

    let resp = app.get("/videos?page=abc&limit=0", None).await;
    resp.assert_status(StatusCode::OK);
    assert_eq!(resp.value()["pagination"]["page"], 1);
}

#[serial]
#[tokio::test]
async fn test_wrongly_typed_body_is_a_validation_error() {
    let app = TestApp::new().await;
    let teacher = app.signup("t@school.test", "TEACHER").await;

    let resp = app
        .post("/courses", Some(&teacher.token), json!({ "title": "X", "price": "10" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.value()["error"], "bad_request");

    let resp = app
        .send("POST", "/videos", Some(&teacher.token), None)
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.value()["error"], "bad_request");

    assert_eq!(app.count(entity::course::Entity).await, 0);
}

#[serial]
#[tokio::test]
async fn test_get_course_detail() {
    let app = TestApp::new().await;
    let teacher = app.signup("t@school.test", "TEACHER").await;
    let student = app.signup("s@school.test", "USER").await;

    let course_id = app.create_course(&teacher, "Rust", "Programming", 0.0).await;
    app.create_video(&teacher, &course_id, "ownership").await;
    app.create_video(&teacher, &course_id, "borrowing").await;
    app.enroll(&student, &course_id).await.assert_status(StatusCode::CREATED);

    let resp = app.get(&format!("/courses/{course_id}"), None).await;
    resp.assert_status(StatusCode::OK);
    let json = resp.value();
    assert_eq!(json["title"], "Rust");
    assert_eq!(json["teacher"]["id"], teacher.id);
    assert_eq!(json["videoCount"], 2);
    assert_eq!(json["enrollmentCount"], 1);
    assert_eq!(json["videos"].as_array().unwrap().len(), 2);

    let resp = app.get("/courses/does-not-exist", None).await;
    resp.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(resp.value()["message"], "Course not found");
}

// ─── Cascade delete ──────────────────────────────────────────────────────────

#[serial]
#[tokio::test]
async fn test_delete_course_removes_dependents() {
    let app = TestApp::new().await;
    let teacher = app.signup("t@school.test", "TEACHER").await;
    let first = app.signup("s1@school.test", "USER").await;
    let second = app.signup("s2@school.test", "USER").await;

    let course_id = app.create_course(&teacher, "Doomed", "Misc", 0.0).await;
    let keep_id = app.create_course(&teacher, "Survivor", "Misc", 0.0).await;
    let video_id = app.create_video(&teacher, &course_id, "v1").await;
    app.create_video(&teacher, &course_id, "v2").await;
    app.create_video(&teacher, &course_id, "v3").await;
    app.create_video(&teacher, &keep_id, "kept").await;

    app.enroll(&first, &course_id).await.assert_status(StatusCode::CREATED);
    app.enroll(&second, &course_id).await.assert_status(StatusCode::CREATED);
    app.mark_watched(&first, &video_id).await.assert_status(StatusCode::OK);

    let resp = app
        .post(
            "/teacher/exams",
            Some(&teacher.token),
            json!({ "courseId": course_id, "title": "Final", "scheduledAt": "2026-12-01" }),
        )
        .await;
    resp.assert_status(StatusCode::CREATED);
    let exam_id = resp.value()["id"].as_str().unwrap().to_string();
    app.post(
        &format!("/mock-tests/{exam_id}/attempts"),
        Some(&second.token),
        json!({ "score": 80 }),
    )
    .await
    .assert_status(StatusCode::CREATED);

    app.post(
        "/teacher/certificates",
        Some(&teacher.token),
        json!({
            "userId": first.id,
            "courseId": course_id,
            "grade": "A",
            "fileUrl": "https://certs.test/1.pdf",
        }),
    )
    .await
    .assert_status(StatusCode::CREATED);

    let resp = app
        .delete(&format!("/courses/{course_id}"), Some(&teacher.token))
        .await;
    resp.assert_status(StatusCode::OK);
    let json = resp.value();
    assert_eq!(json["deleted"]["videos"], 3);
    assert_eq!(json["deleted"]["enrollments"], 2);
    assert_eq!(json["deleted"]["certificates"], 1);
    assert_eq!(json["deleted"]["mockTests"], 1);

    assert_eq!(app.count(entity::course::Entity).await, 1);
    assert_eq!(app.count(entity::video::Entity).await, 1);
    assert_eq!(app.count(entity::enrollment::Entity).await, 0);
    assert_eq!(app.count(entity::certificate::Entity).await, 0);
    assert_eq!(app.count(entity::video_progress::Entity).await, 0);
    assert_eq!(app.count(entity::mock_test::Entity).await, 0);
    assert_eq!(app.count(entity::mock_attempt::Entity).await, 0);

    app.get(&format!("/courses/{course_id}"), None)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ─── Videos ──────────────────────────────────────────────────────────────────

#[serial]
#[tokio::test]
async fn test_video_ownership_follows_course() {
    let app = TestApp::new().await;
    let owner = app.signup("x@school.test", "TEACHER").await;
    let other = app.signup("y@school.test", "TEACHER").await;
    let admin = app.signup("admin@school.test", "ADMIN").await;

    let course_id = app.create_course(&owner, "Owned", "Misc", 0.0).await;
    let other_course = app.create_course(&other, "Other", "Misc", 0.0).await;

    // Adding a video to someone else's course is refused.
    app.post(
        "/videos",
        Some(&other.token),
        json!({ "title": "intruder", "link": "https://v.test/i", "courseId": course_id }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    let video_id = app.create_video(&owner, &course_id, "intro").await;

    app.put(
        &format!("/videos/{video_id}"),
        Some(&other.token),
        json!({ "title": "renamed" }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    let resp = app
        .put(
            &format!("/videos/{video_id}"),
            Some(&owner.token),
            json!({ "title": "Introduction", "views": 42 }),
        )
        .await;
    resp.assert_status(StatusCode::OK);
    assert_eq!(resp.value()["title"], "Introduction");
    assert_eq!(resp.value()["views"], 42);

    // Moving into a course the caller does not own is refused.
    app.put(
        &format!("/videos/{video_id}"),
        Some(&owner.token),
        json!({ "courseId": other_course }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    let resp = app
        .put(
            &format!("/videos/{video_id}"),
            Some(&admin.token),
            json!({ "courseId": other_course }),
        )
        .await;
    resp.assert_status(StatusCode::OK);
    assert_eq!(resp.value()["courseId"], other_course);

    // Ownership now follows the new course.
    app.delete(&format!("/videos/{video_id}"), Some(&owner.token))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.delete(&format!("/videos/{video_id}"), Some(&other.token))
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(app.count(entity::video::Entity).await, 0);
}

#[serial]
#[tokio::test]
async fn test_create_video_validation() {
    let app = TestApp::new().await;
    let teacher = app.signup("t@school.test", "TEACHER").await;
    let student = app.signup("s@school.test", "USER").await;
    let course_id = app.create_course(&teacher, "Course", "Misc", 0.0).await;

    app.post(
        "/videos",
        Some(&teacher.token),
        json!({ "title": "orphan", "link": "https://v.test/o", "courseId": "missing" }),
    )
    .await
    .assert_status(StatusCode::NOT_FOUND);

    app.post(
        "/videos",
        Some(&teacher.token),
        json!({ "title": "no link", "courseId": course_id }),
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST);

    app.post(
        "/videos",
        Some(&teacher.token),
        json!({ "title": "neg", "link": "https://v.test/n", "courseId": course_id, "views": -3 }),
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST);

    app.post(
        "/videos",
        Some(&student.token),
        json!({ "title": "student", "link": "https://v.test/s", "courseId": course_id }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    assert_eq!(app.count(entity::video::Entity).await, 0);
}

#[serial]
#[tokio::test]
async fn test_list_videos() {
    let app = TestApp::new().await;
    let teacher = app.signup("t@school.test", "TEACHER").await;
    let first = app.create_course(&teacher, "First", "Misc", 0.0).await;
    let second = app.create_course(&teacher, "Second", "Misc", 0.0).await;

    for i in 0..12 {
        app.create_video(&teacher, &first, &format!("lesson-{i}")).await;
    }
    let video_id = app.create_video(&teacher, &second, "finale").await;

    let resp = app.get("/videos", None).await;
    resp.assert_status(StatusCode::OK);
    let json = resp.value();
    assert_eq!(json["data"].as_array().unwrap().len(), 10);
    assert_eq!(json["pagination"]["total"], 13);
    assert_eq!(json["pagination"]["pages"], 2);

    let resp = app.get(&format!("/videos?courseId={second}"), None).await;
    let json = resp.value();
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["data"][0]["id"], video_id);

    let resp = app.get("/videos?search=FINALE", None).await;
    assert_eq!(resp.value()["pagination"]["total"], 1);

    let resp = app.get(&format!("/videos/{video_id}"), None).await;
    resp.assert_status(StatusCode::OK);
    assert_eq!(resp.value()["title"], "finale");

    app.get("/videos/missing", None)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
