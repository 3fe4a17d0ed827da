// 外部服務：Gemini 影像分析與 Google Solar 建物資料
pub mod gemini;
pub mod solar;
